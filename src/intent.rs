//! Local intent interception
//!
//! A handful of phrases are answered without contacting the completion
//! service. The same [`classify`] runs in the turn controller and in the
//! relay's chat handler so behavior does not depend on which side of the
//! network a transcript lands.

/// YouTube home page
pub const YOUTUBE_URL: &str = "https://www.youtube.com";

/// Google home page
pub const GOOGLE_URL: &str = "https://www.google.com";

const YOUTUBE_REPLY: &str = "Opening YouTube for you!";
const GOOGLE_REPLY: &str = "Opening Google for you!";
const FAREWELL_REPLY: &str = "Goodbye! Have a great day!";

/// Outcome of classifying a transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Answer locally and open a site
    OpenSite {
        /// Page to open
        url: &'static str,
        /// Fixed spoken reply
        reply: &'static str,
    },
    /// Answer locally, no side effect
    Farewell {
        /// Fixed spoken reply
        reply: &'static str,
    },
    /// Not recognized; send to the completion service
    Delegate,
}

impl Intent {
    /// Fixed reply for intercepted intents, `None` for [`Intent::Delegate`]
    #[must_use]
    pub const fn reply(&self) -> Option<&'static str> {
        match self {
            Self::OpenSite { reply, .. } | Self::Farewell { reply } => Some(*reply),
            Self::Delegate => None,
        }
    }

    /// Site to open, if any
    #[must_use]
    pub const fn url(&self) -> Option<&'static str> {
        match self {
            Self::OpenSite { url, .. } => Some(*url),
            Self::Farewell { .. } | Self::Delegate => None,
        }
    }

    /// Whether the transcript was answered locally
    #[must_use]
    pub const fn is_intercepted(&self) -> bool {
        !matches!(self, Self::Delegate)
    }
}

/// Classify a transcript, first match wins
///
/// Matching is a case-insensitive substring test in fixed priority order:
/// "open youtube", then "open google", then "bye"/"goodbye".
#[must_use]
pub fn classify(transcript: &str) -> Intent {
    let normalized = transcript.to_lowercase();

    if normalized.contains("open youtube") {
        return Intent::OpenSite {
            url: YOUTUBE_URL,
            reply: YOUTUBE_REPLY,
        };
    }

    if normalized.contains("open google") {
        return Intent::OpenSite {
            url: GOOGLE_URL,
            reply: GOOGLE_REPLY,
        };
    }

    // "goodbye" is subsumed by "bye"
    if normalized.contains("bye") || normalized.contains("goodbye") {
        return Intent::Farewell {
            reply: FAREWELL_REPLY,
        };
    }

    Intent::Delegate
}
