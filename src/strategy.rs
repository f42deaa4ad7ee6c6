use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prompting strategy used to elicit a star rating from the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Ask for the rating directly, as a bare JSON object
    Direct,
    /// Show labelled example reviews before the target review
    #[value(name = "few_shot")]
    FewShot,
    /// Spell out what each star level means before asking
    Rubric,
}

/// Labelled reviews shown to the model by the few-shot strategy, one per star level.
const FEW_SHOT_EXAMPLES: [(&str, u8); 5] = [
    (
        "Waited over an hour, the food came out cold and the manager shrugged when we complained. Never again.",
        1,
    ),
    (
        "The pasta was bland and overpriced. Service was friendly enough but I wouldn't rush back.",
        2,
    ),
    (
        "Decent burgers, nothing special. Fries were a bit soggy but the place was clean and quick.",
        3,
    ),
    (
        "Really good tacos and a great salsa bar. Only gripe is the noise level on weekends.",
        4,
    ),
    (
        "Absolutely fantastic! Every dish was perfect, the staff remembered our names, and dessert was unreal.",
        5,
    ),
];

const RUBRIC: &str = "\
1 star: very negative. Serious problems with food, service or cleanliness; the reviewer will not return.
2 stars: mostly negative. Several complaints with at most minor positives.
3 stars: mixed or neutral. Positives and negatives roughly balance, or the experience was unremarkable.
4 stars: mostly positive. Clearly satisfied, with small reservations.
5 stars: very positive. Enthusiastic praise with no meaningful complaints.";

const OUTPUT_INSTRUCTION: &str = "Respond with only a JSON object of the form \
{\"predicted_stars\": <integer 1-5>, \"explanation\": \"<one short sentence>\"} and nothing else.";

impl Strategy {
    /// Every strategy, in reporting order
    pub const ALL: [Strategy; 3] = [Strategy::Direct, Strategy::FewShot, Strategy::Rubric];

    /// Stable identifier used in tables and artifacts
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Direct => "direct",
            Strategy::FewShot => "few_shot",
            Strategy::Rubric => "rubric",
        }
    }

    /// Build the full prompt for a review
    pub fn build_prompt(&self, review_text: &str) -> String {
        match self {
            Strategy::Direct => format!(
                "Classify the following restaurant review into a star rating from 1 to 5.\n\n\
                 Review: \"{}\"\n\n{}",
                review_text, OUTPUT_INSTRUCTION
            ),
            Strategy::FewShot => {
                let examples = FEW_SHOT_EXAMPLES
                    .iter()
                    .map(|(text, stars)| {
                        format!("Review: \"{}\"\n{{\"predicted_stars\": {}}}", text, stars)
                    })
                    .collect::<Vec<_>>()
                    .join("\n\n");

                format!(
                    "Predict the star rating (1 to 5) of a restaurant review. \
                     Here are labelled examples:\n\n{}\n\nNow rate this review.\n\n\
                     Review: \"{}\"\n\n{}",
                    examples, review_text, OUTPUT_INSTRUCTION
                )
            }
            Strategy::Rubric => format!(
                "Rate the following restaurant review from 1 to 5 stars using this rubric:\n\n{}\n\n\
                 Consider food quality, service, value and whether the reviewer would return.\n\n\
                 Review: \"{}\"\n\n{}",
                RUBRIC, review_text, OUTPUT_INSTRUCTION
            ),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
