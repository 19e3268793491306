//! Rule-based maintenance assistant.
//!
//! Keyword intents over the lowercased message, checked in a fixed order.
//! When the user is inside a guide step, replies are about that step.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const GREETINGS: &[&str] = &[
    "Hello! I'm the TechCare assistant. I'm here to help you maintain your computer.",
    "Welcome to TechCare! I'm here to guide you through your computer's maintenance steps.",
    "Hi! I specialize in guiding computer maintenance. How can I help today?",
];

const GUIDED_PROCESS: &str = "Guided maintenance splits complex tasks into simple steps you can do yourself. You pick the problem to solve and I show you exactly what to do, with detailed instructions.";

const DIFFICULTY: &str = "Don't worry! The instructions are detailed and designed for anyone to follow, even without technical knowledge. If you have questions, I'm here to help at every step.";

const SLOWNESS: &str = "A slow computer can have several causes. The performance guide shows you how to: 1) Close programs that use a lot of resources, 2) Clear temporary files, 3) Disable unnecessary startup programs, 4) Check for malware.";

const DISK_SPACE: &str = "To free disk space, the guide shows you how to: 1) Find large files you can move or delete, 2) Run the cleaner, 3) Uninstall unused programs, 4) Check for duplicate files.";

const STARTUP: &str = "To speed up startup you will learn to: 1) Disable unnecessary startup programs, 2) Check services that can be optimized, 3) Measure boot time with systemd-analyze, 4) Check the disk for problems.";

const DRIVERS: &str = "Keeping drivers up to date matters for performance and compatibility. The guide shows you how to: 1) Find devices without drivers, 2) Install kernel and firmware updates, 3) Install vendor drivers correctly, 4) Check for problems after updating.";

const SECURITY: &str = "To keep your computer safe the guide teaches you to: 1) Check that the firewall is active, 2) Run a full malware scan, 3) Install security updates, 4) Review firewall rules.";

const FREQUENCY: &str = "We recommend basic maintenance monthly (temporary files and startup check) and a full maintenance every 3 to 6 months.";

const PREVENTION: &str = "To avoid future problems: 1) Don't install unnecessary software, 2) Keep the system and antivirus updated, 3) Make regular backups, 4) Don't overfill the disk (keep at least 15% free).";

const HARDWARE: &str = "If your computer is still slow after software optimization, consider hardware upgrades: more RAM, replacing an HDD with an SSD, or in extreme cases a new processor.";

const STEP_FAILED: &str = "If you can't complete a step, we can try another approach. Tell me exactly where you're stuck and what happens when you follow the instructions.";

const STEP_ERROR: &str = "If you got an error message, tell me the exact code or text. That helps identify the specific cause and the right solution.";

const STEP_FROZEN: &str = "If an application freezes during maintenance, you can force it to close: run kill <PID> from a terminal or use your desktop's system monitor. Then we can try another approach.";

const STEP_ADMIN: &str = "Some maintenance tasks require administrator permissions. Run the command with sudo when asked. If you don't have administrator access, you may need help from the system administrator.";

const FALLBACK: &str = "I can help with computer maintenance guidance. Ask me how to fix slowness, free disk space, speed up startup, update drivers or improve security. If you're following a step-by-step guide and need help with a specific step, let me know.";

pub const ERROR_REPLY: &str = "Sorry, something went wrong while processing your message. Please try again.";

/// What the assistant recognized in a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greeting,
    GuidedMaintenance,
    Difficulty,
    Slowness,
    DiskSpace,
    Startup,
    Drivers,
    Security,
    Frequency,
    Prevention,
    StepError,
    StepFrozen,
    StepPermission,
    StepTrouble,
    Hardware,
    Unknown,
}

fn contains_any(message: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| message.contains(k))
}

fn contains_word(message: &str, words: &[&str]) -> bool {
    message
        .split(|c: char| !c.is_alphanumeric())
        .any(|w| words.contains(&w))
}

fn is_greeting(message: &str) -> bool {
    // Short greetings must be whole words ("hi" appears inside many words)
    const WORDS: &[&str] = &["hi", "hey", "oi", "ola", "olá", "hello"];
    const PHRASES: &[&str] = &[
        "good morning",
        "good afternoon",
        "good evening",
        "bom dia",
        "boa tarde",
        "boa noite",
        "e aí",
        "e ai",
    ];
    contains_word(message, WORDS) || contains_any(message, PHRASES)
}

/// Classify a lowercased message
pub fn classify(message: &str) -> Intent {
    let m = message;

    if is_greeting(m) {
        return Intent::Greeting;
    }
    if contains_any(
        m,
        &[
            "how does it work",
            "how it works",
            "guided maintenance",
            "how to use",
            "step by step",
            "guide",
            "como funciona",
            "manutenção guiada",
            "manutencao guiada",
            "passo a passo",
        ],
    ) {
        return Intent::GuidedMaintenance;
    }
    if contains_any(
        m,
        &[
            "difficult",
            "complicated",
            "complex",
            "don't know",
            "dont know",
            "difícil",
            "dificil",
            "complicado",
            "não sei",
            "nao sei",
        ],
    ) {
        return Intent::Difficulty;
    }
    if contains_any(
        m,
        &["slow", "lagging", "freezing", "lento", "devagar", "lentidão", "lentidao", "travando"],
    ) {
        return Intent::Slowness;
    }
    if contains_any(
        m,
        &[
            "disk space",
            "disk full",
            "storage",
            "free space",
            "espaço",
            "espaco",
            "disco cheio",
            "armazenamento",
            "liberar",
            "ssd",
        ],
    ) || contains_word(m, &["hd", "hdd"])
    {
        return Intent::DiskSpace;
    }
    if contains_any(
        m,
        &[
            "startup",
            "boot",
            "takes long to start",
            "inicialização",
            "inicializacao",
            "iniciar",
            "demora para ligar",
        ],
    ) {
        return Intent::Startup;
    }
    // "hardware" routes to drivers ahead of the upgrade check
    if contains_any(m, &["driver", "atualizar drivers", "hardware"]) {
        return Intent::Drivers;
    }
    if contains_any(
        m,
        &[
            "security",
            "virus",
            "malware",
            "firewall",
            "defender",
            "segurança",
            "seguranca",
            "vírus",
        ],
    ) {
        return Intent::Security;
    }
    if contains_any(
        m,
        &[
            "how often",
            "frequency",
            "regularly",
            "when should",
            "frequência",
            "frequencia",
            "frequente",
            "regularmente",
            "quando fazer",
        ],
    ) {
        return Intent::Frequency;
    }
    if contains_any(
        m,
        &["prevent", "avoid", "future", "prevenir", "prevenção", "prevencao", "evitar", "futuro"],
    ) {
        return Intent::Prevention;
    }
    if contains_any(
        m,
        &[
            "can't",
            "cannot",
            "problem",
            "trouble",
            "help with",
            "step",
            "não consigo",
            "nao consigo",
            "dificuldade",
            "ajuda com",
            "etapa",
        ],
    ) {
        if contains_any(m, &["error", "warning", "mensagem de erro", "erro", "aviso"]) {
            return Intent::StepError;
        }
        if contains_any(m, &["froze", "frozen", "stuck", "travou", "travado", "congelou"]) {
            return Intent::StepFrozen;
        }
        if contains_any(m, &["permission", "administrador", "admin", "sudo", "root", "permissão", "permissao"]) {
            return Intent::StepPermission;
        }
        return Intent::StepTrouble;
    }
    if contains_any(m, &["upgrade", "improve", "buy", "part", "melhorar", "comprar", "peça", "peca"]) {
        return Intent::Hardware;
    }
    Intent::Unknown
}

/// The guide step the user is currently working on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepContext {
    pub title: String,
    pub instructions: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detailed_instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub benefit: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatEngine {
    history: Vec<ChatMessage>,
    context: BTreeMap<String, String>,
    current_step: Option<StepContext>,
    greeting_cursor: usize,
}

impl ChatEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer a user message; both sides are recorded in history
    pub fn reply(&mut self, message: &str) -> String {
        self.push(ChatRole::User, message);
        let response = self.respond(&message.to_lowercase());
        self.push(ChatRole::Assistant, &response);
        response
    }

    /// Greeting shown when a session opens (recorded as assistant message)
    pub fn greet(&mut self) -> String {
        let text = self.next_greeting().to_string();
        self.push(ChatRole::Assistant, &text);
        text
    }

    fn push(&mut self, role: ChatRole, text: &str) {
        self.history.push(ChatMessage {
            role,
            text: text.to_string(),
            at: Utc::now(),
        });
    }

    fn next_greeting(&mut self) -> &'static str {
        let text = GREETINGS[self.greeting_cursor % GREETINGS.len()];
        self.greeting_cursor = (self.greeting_cursor + 1) % GREETINGS.len();
        text
    }

    fn respond(&mut self, message: &str) -> String {
        if let Some(step) = &self.current_step {
            return step_reply(step, message);
        }

        let text = match classify(message) {
            Intent::Greeting => self.next_greeting(),
            Intent::GuidedMaintenance => GUIDED_PROCESS,
            Intent::Difficulty => DIFFICULTY,
            Intent::Slowness => SLOWNESS,
            Intent::DiskSpace => DISK_SPACE,
            Intent::Startup => STARTUP,
            Intent::Drivers => DRIVERS,
            Intent::Security => SECURITY,
            Intent::Frequency => FREQUENCY,
            Intent::Prevention => PREVENTION,
            Intent::StepError => STEP_ERROR,
            Intent::StepFrozen => STEP_FROZEN,
            Intent::StepPermission => STEP_ADMIN,
            Intent::StepTrouble => STEP_FAILED,
            Intent::Hardware => HARDWARE,
            Intent::Unknown => FALLBACK,
        };
        text.to_string()
    }

    pub fn set_step(&mut self, step: StepContext) {
        self.current_step = Some(step);
    }

    pub fn clear_step(&mut self) {
        self.current_step = None;
    }

    pub fn current_step(&self) -> Option<&StepContext> {
        self.current_step.as_ref()
    }

    pub fn set_context(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.context.insert(key.into(), value.into());
    }

    pub fn context(&self, key: &str) -> Option<&str> {
        self.context.get(key).map(String::as_str)
    }

    pub fn clear_context(&mut self) {
        self.context.clear();
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }
}

fn step_reply(step: &StepContext, message: &str) -> String {
    if contains_any(
        message,
        &[
            "can't",
            "cannot",
            "difficult",
            "problem",
            "how do i",
            "não consigo",
            "nao consigo",
            "dificuldade",
            "problema",
            "como faço",
            "como faco",
        ],
    ) {
        let detail = step
            .detailed_instructions
            .as_deref()
            .unwrap_or(&step.instructions);
        return format!(
            "For the step \"{}\", here is a more detailed explanation:\n\n{}\n\nIf you're still having trouble, we can try another approach. Tell me exactly where you're stuck.",
            step.title, detail
        );
    }

    if contains_any(message, &["why", "what for", "por que", "porque", "qual motivo", "para que"]) {
        return format!(
            "This step matters because {}. {}",
            step.rationale
                .as_deref()
                .unwrap_or("it helps improve your computer's performance"),
            step.benefit
                .as_deref()
                .unwrap_or("Once it's done you'll notice the system running better.")
        );
    }

    if contains_any(
        message,
        &["done", "finished", "completed", "ready", "concluí", "conclui", "terminei", "feito", "pronto"],
    ) {
        return "Excellent! Mark this step as completed in the guide and move on to the next one. If you have questions about the next step, I'm here to help.".to_string();
    }

    if contains_any(message, &["next", "after", "then", "próximo", "proximo", "próxima", "proxima", "depois"]) {
        return "After finishing this step, mark it as completed to move on to the next task. The guide takes you through the required steps in order.".to_string();
    }

    format!(
        "You're on the step \"{}\". If you have specific questions about this step, or ran into a problem, tell me so I can help.",
        step.title
    )
}
