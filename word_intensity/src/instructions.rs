// Rating guidance shown before the questions of a survey.

use crate::config::SurveyId;

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct CategoryInstruction {
    pub name: &'static str,
    pub meaning: &'static str,
    /// Example sentences. The word being rated is between asterisks.
    pub examples: [&'static str; 3],
    pub rating: &'static str,
}

pub const IMPORTANCE: CategoryInstruction = CategoryInstruction {
    name: "IMPORTANCE",
    meaning: "These words make the research sound important or urgent",
    examples: [
        "Early diagnosis is *essential* for improving patient survival rates.",
        "Reducing hospital infections is a *priority* for public health.",
        "Funding for vaccine research is *crucial* to prevent future outbreaks.",
    ],
    rating: "Judge how strongly the word makes the research sound important or urgent.",
};

pub const NOVELTY: CategoryInstruction = CategoryInstruction {
    name: "NOVELTY",
    meaning: "These words make the research sound new or different from anything done before.",
    examples: [
        "The team developed a *new* method for detecting rare cancers.",
        "This study offers an *unprecedented* view of brain activity during sleep.",
        "The drug uses an *innovative* delivery system to target specific cells.",
    ],
    rating: "Judge how strongly the word makes the research seem original or different from existing work.",
};

pub const RIGOUR: CategoryInstruction = CategoryInstruction {
    name: "RIGOUR",
    meaning: "These words make the research sound careful, precise, and done to a high standard.",
    examples: [
        "The trial was conducted in a *controlled* setting to ensure accurate results.",
        "Data were analysed using *careful* statistical methods.",
        "The researchers followed a *strict* protocol throughout the experiment.",
    ],
    rating: "Judge how strongly the word promotes the idea that the research was carried out with high standards and precision.",
};

pub const SCALE: CategoryInstruction = CategoryInstruction {
    name: "SCALE",
    meaning: "These words make the research sound big in size, scope, or range.",
    examples: [
        "The study included a *large-scale* survey of hospital patients.",
        "The outbreak affected a *vast* area of the country.",
        "The database contains a *huge* amount of genetic information.",
    ],
    rating: "Judge how strongly the word makes the research seem large in scope, reach, or amount.",
};

pub const UTILITY: CategoryInstruction = CategoryInstruction {
    name: "UTILITY",
    meaning: "These words make the research sound useful, practical, and/or benefits.",
    examples: [
        "The new tool is *useful* for monitoring blood sugar levels at home.",
        "This app provides *practical* guidance for managing symptoms.",
        "The treatment has been shown to be *effective* in reducing pain.",
    ],
    rating: "Judge how strongly the word makes the research or method sound helpful, beneficial, or applicable in practice.",
};

pub const QUALITY: CategoryInstruction = CategoryInstruction {
    name: "QUALITY",
    meaning: "These words make the people or environment involved in the research sound skilled, capable, or well regarded.",
    examples: [
        "The hospital is known for its *skilled* surgical team.",
        "The lab is equipped with *dedicated* scanning technology.",
        "The team works in a *renowned* research institute.",
    ],
    rating: "Judge how strongly the word suggests that the people, facilities, or organisation involved are of high standing or ability.",
};

pub const ATTITUDE: CategoryInstruction = CategoryInstruction {
    name: "ATTITUDE",
    meaning: "These words show a positive reaction or strong approval of the research.",
    examples: [
        "The results are *exciting* for the future of cancer treatment.",
        "This finding is *remarkable* and may change clinical practice.",
        "The study offers an *inspiring* example of patient-led research.",
    ],
    rating: "Judge how strongly the word shows enthusiasm, approval, or a positive emotional response to the research.",
};

pub const PROBLEM: CategoryInstruction = CategoryInstruction {
    name: "PROBLEM",
    meaning: "These words make an issue sound serious or in need of urgent attention.",
    examples: [
        "Antibiotic resistance is an *alarming* global health threat.",
        "Shortages of medical staff are a *serious* concern for rural clinics.",
        "The rise in obesity is a *pressing* public health issue.",
    ],
    rating: "Judge how strongly the word makes the problem seem severe, urgent, or demanding immediate action.",
};

/// The categories rated in a survey, in presentation order.
pub fn categories_for(survey: SurveyId) -> &'static [CategoryInstruction] {
    match survey.number() {
        1 => &[ATTITUDE, IMPORTANCE],
        2 => &[QUALITY, PROBLEM],
        3 => &[NOVELTY, RIGOUR],
        4 => &[SCALE],
        _ => &[UTILITY],
    }
}
