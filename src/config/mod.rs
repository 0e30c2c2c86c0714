pub mod prompt;

pub const AI_NAME: &str = "NitiBot";
pub const OWNER_NAME: &str = "Team NitiBot";
pub const TAGLINE: &str = "Empowering India's Founder Story";

pub const WELCOME_MESSAGE: &str = "Namaste! I'm NitiBot, your copilot for Indian startup policy, funding and compliance. \
Ask me about DPIIT recognition, Startup India benefits, SISFS, MSME/Udyam, state startup policies and more.";

pub const CLEAR_CHAT_TEXT: &str = "Chat cleared";

pub const INPUT_PLACEHOLDER: &str = "Ask anything about Startup India, MSME, policies, funding...";

/// Starter questions offered while the conversation holds only the greeting.
pub const SUGGESTED_QUESTIONS: [&str; 5] = [
    "Am I eligible for DPIIT?",
    "Explain SISFS funding",
    "Compare BIRAC vs PRAYAS",
    "Checklist for Startup India registration",
    "What's new this month?",
];
