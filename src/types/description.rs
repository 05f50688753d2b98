//! Structured description block stored in Nextcloud bookmark descriptions.
//!
//! The wire format is plain text with Markdown-style headers; Nextcloud search
//! and earlier imports depend on the exact header strings:
//!
//! ```text
//! <free text>
//!
//! # BOOKMARKED
//! <created_at>
//!
//! # LLM_DESCRIPTION
//! ###LLM###
//!
//! # ANNOTATIONS
//! <highlights>
//! ```

pub const BOOKMARKED_HEADER: &str = "# BOOKMARKED";
pub const LLM_HEADER: &str = "# LLM_DESCRIPTION";
pub const ANNOTATIONS_HEADER: &str = "# ANNOTATIONS";
pub const PREVIOUS_HEADER: &str = "# PREVIOUS";
pub const LLM_PLACEHOLDER: &str = "###LLM###";

/// Content of the `# LLM_DESCRIPTION` section.
#[derive(Debug, Clone, PartialEq)]
pub enum LlmSection {
    /// Still waiting for a generated description.
    Placeholder,
    Generated(String),
}

impl LlmSection {
    fn as_wire(&self) -> &str {
        match self {
            LlmSection::Placeholder => LLM_PLACEHOLDER,
            LlmSection::Generated(text) => text,
        }
    }

    fn from_wire(s: &str) -> Self {
        if s == LLM_PLACEHOLDER {
            LlmSection::Placeholder
        } else {
            LlmSection::Generated(s.to_string())
        }
    }
}

/// Parsed form of a composed description.
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptionBlock {
    pub text: String,
    pub bookmarked: String,
    /// `None` if the description predates the LLM section.
    pub llm: Option<LlmSection>,
    pub annotations: String,
}

impl DescriptionBlock {
    pub fn new(text: &str, bookmarked: &str, annotations: &str) -> Self {
        Self {
            text: text.to_string(),
            bookmarked: bookmarked.to_string(),
            llm: Some(LlmSection::Placeholder),
            annotations: annotations.to_string(),
        }
    }

    /// True if `description` already carries both the `# BOOKMARKED` and
    /// `# ANNOTATIONS` markers, i.e. a previous run composed it.
    pub fn is_composed(description: &str) -> bool {
        description.contains(BOOKMARKED_HEADER) && description.contains(ANNOTATIONS_HEADER)
    }

    /// Serializes to the wire format.
    pub fn compose(&self) -> String {
        let mut out = format!("{}\n\n{}\n{}\n\n", self.text, BOOKMARKED_HEADER, self.bookmarked);
        if let Some(llm) = &self.llm {
            out.push_str(&format!("{}\n{}\n\n", LLM_HEADER, llm.as_wire()));
        }
        out.push_str(&format!("{}\n{}\n", ANNOTATIONS_HEADER, self.annotations));
        out
    }

    /// Parses a composed description. Returns `None` if the markers are missing.
    pub fn parse(description: &str) -> Option<Self> {
        if !Self::is_composed(description) {
            return None;
        }
        let bookmarked_marker = format!("{}\n", BOOKMARKED_HEADER);
        let (text, rest) = description.split_once(&bookmarked_marker)?;
        let text = text.strip_suffix("\n\n").unwrap_or(text).to_string();

        let annotations_marker = format!("{}\n", ANNOTATIONS_HEADER);
        let (middle, annotations) = rest.split_once(&annotations_marker)?;
        let annotations = annotations.strip_suffix('\n').unwrap_or(annotations).to_string();

        let llm_marker = format!("{}\n", LLM_HEADER);
        let (bookmarked, llm) = match middle.split_once(&llm_marker) {
            Some((bookmarked, llm)) => {
                let llm = llm.strip_suffix("\n\n").unwrap_or(llm);
                (bookmarked, Some(LlmSection::from_wire(llm)))
            }
            None => (middle, None),
        };
        let bookmarked = bookmarked.strip_suffix("\n\n").unwrap_or(bookmarked).to_string();

        Some(Self {
            text,
            bookmarked,
            llm,
            annotations,
        })
    }

    pub fn needs_generation(&self) -> bool {
        matches!(self.llm, None | Some(LlmSection::Placeholder))
    }
}

/// Builds the four-section block for a freshly imported bookmark.
pub fn compose_description(original: &str, created_at: &str, annotations: &str) -> String {
    DescriptionBlock::new(original, created_at, annotations).compose()
}

/// Combines an incoming description with the one already stored at the destination.
///
/// The destination's text stays primary; a differing incoming text is archived
/// below a `# PREVIOUS` header.
pub fn merge_description(candidate: &str, existing: &str) -> String {
    if candidate.is_empty() {
        return existing.to_string();
    }
    if existing.is_empty() {
        return candidate.to_string();
    }
    if candidate == existing {
        return existing.to_string();
    }
    format!("{}{}\n{}", existing, PREVIOUS_HEADER, candidate)
}

/// Replaces every placeholder token with generated text.
pub fn fill_placeholder(description: &str, generated: &str) -> String {
    description.replace(LLM_PLACEHOLDER, generated)
}

/// Returns the description with a pending `# LLM_DESCRIPTION` placeholder, or
/// `None` if it already carries generated text.
///
/// Bookmarks created outside the importer have no LLM section; one is appended.
pub fn prepare_for_generation(description: &str) -> Option<String> {
    if description.contains(LLM_HEADER) {
        return description
            .contains(LLM_PLACEHOLDER)
            .then(|| description.to_string());
    }
    let separator = if description.is_empty() {
        ""
    } else if description.ends_with('\n') {
        "\n"
    } else {
        "\n\n"
    };
    Some(format!(
        "{}{}{}\n{}\n",
        description, separator, LLM_HEADER, LLM_PLACEHOLDER
    ))
}
