use std::fmt;

/// Attachment kinds VK accepts in a `wall.post` attachments field.
/// Anything else on the source post is dropped during parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Photo,
    Video,
    Doc,
}

impl AttachmentKind {
    pub fn from_api_type(kind: &str) -> Option<Self> {
        match kind {
            "photo" => Some(AttachmentKind::Photo),
            "video" => Some(AttachmentKind::Video),
            "doc" => Some(AttachmentKind::Doc),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AttachmentKind::Photo => "photo",
            AttachmentKind::Video => "video",
            AttachmentKind::Doc => "doc",
        }
    }
}

impl fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub kind: AttachmentKind,
    pub owner_id: i64,
    pub id: i64,
}

impl Attachment {
    /// Wire form expected by `wall.post`, e.g. `photo5_9`.
    pub fn descriptor(&self) -> String {
        format!("{}{}_{}", self.kind, self.owner_id, self.id)
    }
}

/// A wall post fetched from a source group. Ephemeral: only its key is
/// persisted, and only after a successful repost.
#[derive(Debug, Clone)]
pub struct WallPost {
    pub id: i64,
    pub owner_id: i64,
    /// Unix timestamp of publication.
    pub date: i64,
    pub text: String,
    pub attachments: Vec<Attachment>,
}

impl WallPost {
    /// Unique dedup key, `{owner_id}_{id}` in VK convention.
    pub fn key(&self) -> String {
        format!("{}_{}", self.owner_id, self.id)
    }

    /// Back-link to the original post, used as `copyright_link`.
    pub fn source_link(&self) -> String {
        format!("https://vk.com/wall{}", self.key())
    }

    /// Comma-joined attachment descriptors for the `wall.post` call.
    pub fn attachments_field(&self) -> String {
        self.attachments
            .iter()
            .map(Attachment::descriptor)
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[derive(Debug, Clone)]
pub struct Comment {
    pub id: i64,
    pub from_id: i64,
    pub date: i64,
    pub text: String,
}

/// Outcome of one post flowing through the repost orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Published,
    Skipped,
    Failed,
}

/// Per-cycle counters. Reset at the start of every cycle; the persisted
/// stats table accumulates them per calendar date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub total_posts: u32,
    pub published_posts: u32,
    pub errors: u32,
}

impl CycleStats {
    pub fn record(&mut self, outcome: ProcessOutcome) {
        self.total_posts += 1;
        match outcome {
            ProcessOutcome::Published => self.published_posts += 1,
            ProcessOutcome::Failed => self.errors += 1,
            ProcessOutcome::Skipped => {}
        }
    }
}

/// Truncates to at most `max_chars` characters without splitting a
/// character. VK counts message length in characters, not bytes.
pub fn clip_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
