use std::sync::mpsc;
use std::sync::mpsc::Receiver;
use std::sync::mpsc::SyncSender;
use std::thread;
use std::thread::JoinHandle;

use nucleo_matcher::Config;
use nucleo_matcher::Matcher;
use nucleo_matcher::Utf32Str;
use nucleo_matcher::pattern::AtomKind;
use nucleo_matcher::pattern::CaseMatching;
use nucleo_matcher::pattern::Normalization;
use nucleo_matcher::pattern::Pattern;
use tracing::debug;

use crate::error::FzfError;

/// Capacity of the matcher input and output streams.
const STREAM_CAPACITY: usize = 1024;

/// Candidate stream fed by a reader; dropping the sender ends the run.
pub type FzfStream = SyncSender<String>;

/// Matcher configuration, expressed as the fzf flags it compiles down to.
#[derive(Clone, Copy, Debug)]
pub struct FzfConfig {
    /// Require an exact substring match instead of fuzzy matching.
    pub exact: bool,
    /// Match case-insensitively.
    pub ignore_case: bool,
    /// Scoring algorithm code: 0 selects the default, `n` maps to `--algo vn`.
    pub algo: u32,
}

impl FzfConfig {
    fn to_args(self, query: &str) -> Vec<String> {
        let mut args = vec![
            "--filter".to_string(),
            query.to_string(),
            "--no-sort".to_string(),
        ];
        if self.exact {
            args.push("--exact".to_string());
        }
        if self.ignore_case {
            args.push("--ignore-case".to_string());
        }
        if self.algo > 0 {
            args.push("--algo".to_string());
            args.push(format!("v{}", self.algo));
        }
        args
    }
}

struct MatcherOptions {
    query: String,
    pattern: Pattern,
    config: Config,
}

fn parse_options(args: &[String]) -> Result<MatcherOptions, FzfError> {
    let mut query = String::new();
    let mut exact = false;
    let mut ignore_case = false;
    let mut config = Config::DEFAULT;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--filter" => {
                query = iter
                    .next()
                    .ok_or_else(|| FzfError::MissingValue("--filter".to_string()))?
                    .clone();
            }
            "--no-sort" => {}
            "--exact" => exact = true,
            "--ignore-case" => ignore_case = true,
            "--algo" => {
                let algo = iter
                    .next()
                    .ok_or_else(|| FzfError::MissingValue("--algo".to_string()))?;
                match algo.as_str() {
                    // v1 is the greedy scheme: take the earliest match.
                    "v1" => config.prefer_prefix = true,
                    "v2" => {}
                    other => return Err(FzfError::UnknownAlgo(other.to_string())),
                }
            }
            other => return Err(FzfError::UnknownFlag(other.to_string())),
        }
    }

    let case = if ignore_case {
        CaseMatching::Ignore
    } else {
        CaseMatching::Respect
    };
    let kind = if exact {
        AtomKind::Substring
    } else {
        AtomKind::Fuzzy
    };
    let pattern = Pattern::new(&query, case, Normalization::Smart, kind);
    Ok(MatcherOptions {
        query,
        pattern,
        config,
    })
}

/// Drains the input stream, forwarding matching names to the output stream
/// in input order. An empty query forwards every candidate unchanged.
fn run_matcher(options: &MatcherOptions, input: Receiver<String>, output: SyncSender<String>) {
    let mut matcher = Matcher::new(options.config.clone());
    let mut buf = Vec::new();
    for name in input {
        let is_match = options.query.is_empty() || {
            let haystack = Utf32Str::new(&name, &mut buf);
            options.pattern.score(haystack, &mut matcher).is_some()
        };
        if is_match && output.send(name).is_err() {
            break;
        }
    }
}

/// Wraps the matcher engine behind a pair of stream endpoints: a reader
/// feeds candidates in, a callback drains matches out.
#[derive(Clone, Copy, Debug)]
pub struct FzfDelegate {
    config: FzfConfig,
}

impl FzfDelegate {
    pub fn new(config: FzfConfig) -> Self {
        Self { config }
    }

    /// Runs the matcher to completion on the current thread. `reader` feeds
    /// the input stream from its own thread and closes it by returning; a
    /// drain thread invokes `on_match` for every value received on the
    /// output stream, and the call returns once the drain is done.
    pub fn execute_sync<F, R>(&self, query: &str, on_match: F, reader: R) -> Result<(), FzfError>
    where
        F: FnMut(String) + Send,
        R: FnOnce(FzfStream) + Send,
    {
        debug!(query, "running filter");
        let options = parse_options(&self.config.to_args(query))?;
        let (input_tx, input_rx) = mpsc::sync_channel(STREAM_CAPACITY);
        let (output_tx, output_rx) = mpsc::sync_channel(STREAM_CAPACITY);
        thread::scope(|scope| {
            scope.spawn(move || reader(input_tx));
            scope.spawn(move || {
                let mut on_match = on_match;
                for name in output_rx {
                    on_match(name);
                }
            });
            run_matcher(&options, input_rx, output_tx);
        });
        debug!(query, "filter finished");
        Ok(())
    }

    /// Same shape as [`execute_sync`](Self::execute_sync) on its own thread,
    /// returning the join handle immediately. Used for worker-parallel
    /// filtering.
    pub fn execute_async<F, R>(
        &self,
        query: &str,
        on_match: F,
        reader: R,
    ) -> JoinHandle<Result<(), FzfError>>
    where
        F: FnMut(String) + Send + 'static,
        R: FnOnce(FzfStream) + Send + 'static,
    {
        let delegate = *self;
        let query = query.to_string();
        thread::spawn(move || delegate.execute_sync(&query, on_match, reader))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const EXACT: FzfConfig = FzfConfig {
        exact: true,
        ignore_case: true,
        algo: 0,
    };

    fn matches(config: FzfConfig, query: &str, candidates: &[&str]) -> Vec<String> {
        let mut found = Vec::new();
        let candidates: Vec<String> = candidates.iter().map(|s| s.to_string()).collect();
        FzfDelegate::new(config)
            .execute_sync(
                query,
                |name| found.push(name),
                move |stream| {
                    for name in candidates {
                        if stream.send(name).is_err() {
                            break;
                        }
                    }
                },
            )
            .expect("matcher options");
        found
    }

    #[test]
    fn exact_substring_matches_in_input_order() {
        let found = matches(
            EXACT,
            "42069_",
            &["142069_", "42069_", "abc", "942069_", "42_069_"],
        );
        assert_eq!(vec!["142069_", "42069_", "942069_"], found);
    }

    #[test]
    fn empty_query_forwards_every_candidate() {
        let found = matches(EXACT, "", &["a", "b", "c"]);
        assert_eq!(vec!["a", "b", "c"], found);
    }

    #[test]
    fn fuzzy_mode_matches_subsequences() {
        let config = FzfConfig {
            exact: false,
            ignore_case: true,
            algo: 0,
        };
        let found = matches(config, "fbr", &["foo_bar", "quux", "Firebird"]);
        assert_eq!(vec!["foo_bar", "Firebird"], found);
    }

    #[test]
    fn case_is_respected_unless_ignored() {
        let config = FzfConfig {
            exact: true,
            ignore_case: false,
            algo: 0,
        };
        assert_eq!(
            Vec::<String>::new(),
            matches(config, "README", &["readme.md"])
        );
        assert_eq!(vec!["readme.md"], matches(EXACT, "README", &["readme.md"]));
    }

    #[test]
    fn unsupported_algo_is_an_option_error() {
        let config = FzfConfig {
            exact: true,
            ignore_case: true,
            algo: 7,
        };
        let result = FzfDelegate::new(config).execute_sync("q", |_| {}, |_stream| {});
        assert!(matches!(result, Err(FzfError::UnknownAlgo(_))));
    }

    #[test]
    fn unknown_flag_is_rejected() {
        let args = vec!["--frobnicate".to_string()];
        assert!(matches!(
            parse_options(&args),
            Err(FzfError::UnknownFlag(_))
        ));
    }
}
