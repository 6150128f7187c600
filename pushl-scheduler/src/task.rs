use std::fmt;

/// The six kinds of work a process run can submit (spec data model:
/// "Task... kind (feed | entry | websub-ping | webmention-ping |
/// wayback-save | discovery-page)").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Feed,
    Entry,
    WebSubPing,
    WebmentionPing,
    WaybackSave,
    DiscoveryPage,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskKind::Feed => "feed",
            TaskKind::Entry => "entry",
            TaskKind::WebSubPing => "websub-ping",
            TaskKind::WebmentionPing => "webmention-ping",
            TaskKind::WaybackSave => "wayback-save",
            TaskKind::DiscoveryPage => "discovery-page",
        };
        f.write_str(s)
    }
}

/// Identifies a unit of work for dedup purposes: at most one `Task` per
/// `TaskKey` exists for the lifetime of a process run. A webmention-ping
/// and a wayback-save targeting the same URL are distinct tasks, hence
/// `kind` is part of the key rather than just the URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskKey {
    pub kind: TaskKind,
    pub target: String,
}

impl TaskKey {
    pub fn new(kind: TaskKind, target: impl Into<String>) -> Self {
        Self {
            kind,
            target: target.into(),
        }
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.target)
    }
}
