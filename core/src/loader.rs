use std::ffi::OsStr;
use std::fs;
use std::path::Path;
use std::process::Command;
use std::process::Stdio;
use std::sync::mpsc::Sender;

use freedesktop_desktop_entry::DesktopEntry;
use freedesktop_desktop_entry::Iter;
use freedesktop_desktop_entry::default_paths;
use ignore::WalkBuilder;
use tracing::error;
use tracing::warn;

use crate::entry::Entry;

/// Producer side of the entry channel handed to loaders.
pub struct EntrySink {
    tx: Sender<Entry>,
}

impl EntrySink {
    pub(crate) fn new(tx: Sender<Entry>) -> Self {
        Self { tx }
    }

    /// Pushes one discovered entry. Quietly drops it when the consumer is
    /// gone.
    pub fn push(&self, entry: Entry) {
        let _ = self.tx.send(entry);
    }
}

/// A source of entries: pushes what it discovers into the sink and returns
/// when exhausted.
pub type Loader = Box<dyn FnOnce(&EntrySink) + Send>;

/// Walks the platform's data directories for desktop entries and yields one
/// launchable entry per installed application.
pub fn load_applications(sink: &EntrySink) {
    for path in Iter::new(default_paths()) {
        if let Some(entry) = application_entry(&path) {
            sink.push(entry);
        }
    }
}

fn application_entry(path: &Path) -> Option<Entry> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            warn!(path = %path.display(), %err, "failed to read desktop file");
            return None;
        }
    };
    let desktop = match DesktopEntry::decode(path, &raw) {
        Ok(desktop) => desktop,
        Err(err) => {
            warn!(path = %path.display(), %err, "failed to parse desktop file");
            return None;
        }
    };
    if desktop.type_() != Some("Application") || desktop.terminal() || desktop.no_display() {
        return None;
    }
    let name = desktop.name(None)?.to_string();
    let desktop_file = path.to_path_buf();
    Some(Entry::with_action(
        name,
        Box::new(move || {
            launch_detached("gio", [OsStr::new("launch"), desktop_file.as_os_str()]);
        }),
    ))
}

/// Walks the user's home directory and yields one entry per visible regular
/// file, opened with the desktop handler on selection. Hidden files and
/// hidden directories are skipped.
pub fn load_files(sink: &EntrySink) {
    let Some(home) = dirs::home_dir() else {
        error!("failed to locate home directory");
        return;
    };
    walk_files(&home, sink);
}

fn walk_files(root: &Path, sink: &EntrySink) {
    let walker = WalkBuilder::new(root)
        .follow_links(false)
        .ignore(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .parents(false)
        .build();
    for result in walker {
        let dirent = match result {
            Ok(dirent) => dirent,
            Err(err) => {
                warn!(%err, "error while walking files");
                continue;
            }
        };
        if !dirent.file_type().is_some_and(|ty| ty.is_file()) {
            continue;
        }
        let path = dirent.into_path();
        let name = path.to_string_lossy().into_owned();
        sink.push(Entry::with_action(
            name,
            Box::new(move || {
                launch_detached("xdg-open", [path.as_os_str()]);
            }),
        ));
    }
}

/// Spawns `program` detached from the launcher: its own process group, no
/// inherited stdio, never waited on.
fn launch_detached<I, S>(program: &str, args: I)
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
    match command.spawn() {
        Ok(child) => drop(child),
        Err(err) => error!(program, %err, "failed to launch"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::mpsc;
    use tempfile::tempdir;

    fn collect_files(root: &Path) -> Vec<String> {
        let (tx, rx) = mpsc::channel();
        let sink = EntrySink::new(tx);
        walk_files(root, &sink);
        drop(sink);
        let mut names: Vec<String> = rx.iter().map(|entry| entry.name().to_string()).collect();
        names.sort();
        names
    }

    #[test]
    fn walk_skips_hidden_files_and_directories() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path();
        fs::create_dir_all(root.join("docs")).unwrap();
        fs::create_dir_all(root.join(".cache")).unwrap();
        fs::write(root.join("a.txt"), "a").unwrap();
        fs::write(root.join(".hidden"), "h").unwrap();
        fs::write(root.join("docs/b.txt"), "b").unwrap();
        fs::write(root.join(".cache/c.txt"), "c").unwrap();

        let names = collect_files(root);
        assert_eq!(
            vec![
                root.join("a.txt").to_string_lossy().into_owned(),
                root.join("docs/b.txt").to_string_lossy().into_owned(),
            ],
            names
        );
    }

    #[test]
    fn application_entries_come_from_desktop_files() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("editor.desktop");
        fs::write(
            &path,
            "[Desktop Entry]\nType=Application\nName=Editor\nExec=editor %U\n",
        )
        .unwrap();

        let entry = application_entry(&path).expect("application entry");
        assert_eq!("Editor", entry.name());
    }

    #[test]
    fn non_application_desktop_files_are_skipped() {
        let temp = tempdir().expect("tempdir");

        let link = temp.path().join("link.desktop");
        fs::write(&link, "[Desktop Entry]\nType=Link\nName=Somewhere\n").unwrap();
        assert!(application_entry(&link).is_none());

        let hidden = temp.path().join("hidden.desktop");
        fs::write(
            &hidden,
            "[Desktop Entry]\nType=Application\nName=Hidden\nNoDisplay=true\n",
        )
        .unwrap();
        assert!(application_entry(&hidden).is_none());

        let terminal = temp.path().join("term.desktop");
        fs::write(
            &terminal,
            "[Desktop Entry]\nType=Application\nName=Term\nTerminal=true\n",
        )
        .unwrap();
        assert!(application_entry(&terminal).is_none());
    }
}
