use crate::entry::Entry;

/// Builds the synthetic arithmetic candidate for `query`, when it evaluates
/// as an expression. The entry is named `"<query> = <value>"`, integer form
/// when the value has no fractional part. Parse failures yield no entry.
pub fn calculator_entry(query: &str) -> Option<Entry> {
    let value = meval::eval_str(query).ok()?;
    let name = if value == value.trunc() {
        format!("{query} = {}", value as i64)
    } else {
        format!("{query} = {value:.6}")
    };
    Some(Entry::with_action(name, Box::new(|| {})))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn integral_results_use_the_integer_form() {
        let entry = calculator_entry("2+3").expect("expression evaluates");
        assert_eq!("2+3 = 5", entry.name());

        let entry = calculator_entry("10/2").expect("expression evaluates");
        assert_eq!("10/2 = 5", entry.name());
    }

    #[test]
    fn fractional_results_use_the_decimal_form() {
        let entry = calculator_entry("1/2").expect("expression evaluates");
        assert_eq!("1/2 = 0.500000", entry.name());
    }

    #[test]
    fn non_expressions_are_suppressed() {
        assert!(calculator_entry("firefox").is_none());
        assert!(calculator_entry("42069_").is_none());
        assert!(calculator_entry("").is_none());
    }

    #[test]
    fn the_candidate_is_selectable() {
        let entry = calculator_entry("1+1").expect("expression evaluates");
        assert!(entry.activate());
    }
}
