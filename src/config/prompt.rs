use chrono::{ DateTime, Local };
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::error::Error;
use std::fmt;
use std::fs;
use std::path::Path;
use log::info;

#[derive(Debug)]
pub enum PromptError {
    IoError(std::io::Error),
    JsonError(serde_json::Error),
    EmptySection(&'static str),
}

impl fmt::Display for PromptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptError::IoError(e) => write!(f, "Prompt file IO error: {}", e),
            PromptError::JsonError(e) => write!(f, "Prompt JSON parsing error: {}", e),
            PromptError::EmptySection(name) => write!(f, "Prompt section '{}' is empty", name),
        }
    }
}

impl Error for PromptError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PromptError::IoError(e) => Some(e),
            PromptError::JsonError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PromptError {
    fn from(err: std::io::Error) -> Self {
        PromptError::IoError(err)
    }
}

impl From<serde_json::Error> for PromptError {
    fn from(err: serde_json::Error) -> Self {
        PromptError::JsonError(err)
    }
}

const IDENTITY: &str = "\
You are {ai_name}, a startup policy, funding and compliance copilot for the Indian startup ecosystem.
You are built by {owner_name} to help Indian founders, not by any third-party model vendor.";

const MISSION: &str = "\
Your mission:
- Make government policy knowledge accessible to first-time founders.
- Decode Startup India, DPIIT, MSME/Udyam, state startup policies and sectoral schemes.
- Give trustworthy, structured and actionable guidance on funding, eligibility and compliance.";

const DATA_USE: &str = "\
When answering:
1. Prefer retrieved context from the knowledge base.
2. Fall back to real-time web search only when the knowledge base has no answer.
3. Combine both for questions about the latest circulars, updates or current guidelines.
4. If neither source helps, say: \"I do not have specific data on this, but here is what I can infer based on general policy rules.\"";

const TONE: &str = "\
Tone:
- Friendly and encouraging, like a mentor guiding a first-time founder.
- Break complex rules into small parts and explain any jargon immediately.
- Speak like a builder helping another builder, never like a bureaucrat.";

const INDIA_CONTEXT: &str = "\
Indian context:
- Answer with India-specific laws, schemes, ministries and portals (DPIIT, Startup India, MSME/Udyam, SIDBI, MeitY-TIDE, BIRAC BIG, NIDHI-PRAYAS, state policies).
- For taxes, funding and recognition always cover eligibility, benefits, exemptions, required documents, risks and the authority involved.";

const GUARDRAILS: &str = "\
Guardrails:
- Give general guidance only; no binding legal, financial, accounting or tax advice.
- Never invent schemes, clauses or eligibility claims; say so when unsure.
- Never help with fraudulent applications or document manipulation.
- Stay factual and politically neutral.";

const CITATIONS: &str = "\
Citations:
- Cite retrieved documents inline as [Source: filename.pdf] and web results by URL.
- Never cite without content and never invent sources or URLs.";

const STRUCTURE: &str = "\
Preferred answer structure:
1. Short summary
2. Detailed explanation
3. Eligibility
4. Benefits
5. Documents required
6. Step-by-step process
7. State-wise or sector-wise variations
8. Sources";

const FORMATTING: &str = "\
Formatting:
- Use markdown headings, short paragraphs, \"-\" bullets and numbered lists.
- Use **bold** for key points and markdown tables when comparing schemes.
- Never emit long unformatted blocks of text.";

const DOS: &str = "\
Always:
- Explain simply and accurately, compare schemes when asked and suggest concrete next steps.
- Use Indian policy terminology and cite sources.";

const DONTS: &str = "\
Never:
- Hallucinate policy details, fabricate benefits or amounts, or guess deadlines.
- Present outdated rules as current.";

/// Sections of the system prompt. A JSON file may override any subset.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct PromptConfig {
    pub identity: String,
    pub mission: String,
    pub data_use: String,
    pub tone: String,
    pub india_context: String,
    pub guardrails: String,
    pub citations: String,
    pub structure: String,
    pub formatting: String,
    pub dos: String,
    pub donts: String,
}

static DEFAULT_PROMPTS: Lazy<PromptConfig> = Lazy::new(|| PromptConfig {
    identity: IDENTITY.to_string(),
    mission: MISSION.to_string(),
    data_use: DATA_USE.to_string(),
    tone: TONE.to_string(),
    india_context: INDIA_CONTEXT.to_string(),
    guardrails: GUARDRAILS.to_string(),
    citations: CITATIONS.to_string(),
    structure: STRUCTURE.to_string(),
    formatting: FORMATTING.to_string(),
    dos: DOS.to_string(),
    donts: DONTS.to_string(),
});

impl Default for PromptConfig {
    fn default() -> Self {
        DEFAULT_PROMPTS.clone()
    }
}

impl PromptConfig {
    fn sections(&self) -> [(&'static str, &str); 11] {
        [
            ("identity", self.identity.as_str()),
            ("mission", self.mission.as_str()),
            ("data_prioritization", self.data_use.as_str()),
            ("tone", self.tone.as_str()),
            ("india_context", self.india_context.as_str()),
            ("guardrails", self.guardrails.as_str()),
            ("citations", self.citations.as_str()),
            ("structure", self.structure.as_str()),
            ("do", self.dos.as_str()),
            ("dont", self.donts.as_str()),
            ("formatting", self.formatting.as_str()),
        ]
    }

    fn validate(&self) -> Result<(), PromptError> {
        for (name, body) in self.sections() {
            if body.trim().is_empty() {
                return Err(PromptError::EmptySection(name));
            }
        }
        Ok(())
    }

    /// Renders every section as a tagged block, ending with the current
    /// date and time.
    pub fn render(&self, ai_name: &str, owner_name: &str, now: DateTime<Local>) -> String {
        let mut out = String::new();
        for (tag, body) in self.sections() {
            let body = body.replace("{ai_name}", ai_name).replace("{owner_name}", owner_name);
            out.push_str(&format!("<{tag}>\n{}\n</{tag}>\n\n", body.trim()));
        }
        out.push_str(
            &format!("<date_time>\n{}\n</date_time>\n", now.format("%A, %d %B %Y, %H:%M %Z"))
        );
        out
    }
}

pub fn load_prompts<P: AsRef<Path>>(path: P) -> Result<PromptConfig, PromptError> {
    let content = fs::read_to_string(path.as_ref())?;
    let config: PromptConfig = serde_json::from_str(&content)?;
    config.validate()?;
    info!("Loaded prompt overrides from {}", path.as_ref().display());
    Ok(config)
}
