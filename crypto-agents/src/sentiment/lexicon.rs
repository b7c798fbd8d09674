//! Rule-based compound scorer for short social posts.
//!
//! Valences are summed per post with negation flipping the next scored word
//! and intensifiers scaling it, then squashed into [-1, 1] with
//! `s / sqrt(s^2 + alpha)`.

use std::collections::HashMap;

const NORMALIZATION_ALPHA: f64 = 15.0;
const NEGATION_SCALAR: f64 = -0.74;

pub struct LexiconScorer {
    words: HashMap<&'static str, f64>,
    negations: Vec<&'static str>,
    intensifiers: HashMap<&'static str, f64>,
}

impl Default for LexiconScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl LexiconScorer {
    pub fn new() -> Self {
        let words: HashMap<&'static str, f64> = [
            // general
            ("good", 1.9),
            ("great", 3.1),
            ("love", 3.2),
            ("amazing", 2.8),
            ("awesome", 3.1),
            ("excellent", 2.7),
            ("happy", 2.7),
            ("nice", 1.8),
            ("win", 2.8),
            ("winning", 2.4),
            ("best", 3.2),
            ("bad", -2.5),
            ("terrible", -2.1),
            ("awful", -2.0),
            ("hate", -2.7),
            ("worst", -3.1),
            ("sad", -2.1),
            ("scared", -1.9),
            ("lose", -1.8),
            ("losing", -1.6),
            ("ugly", -2.3),
            // market
            ("bullish", 2.5),
            ("moon", 2.0),
            ("mooning", 2.4),
            ("pump", 1.5),
            ("pumping", 1.7),
            ("rally", 2.0),
            ("surge", 2.0),
            ("soar", 2.2),
            ("gain", 1.6),
            ("gains", 1.6),
            ("profit", 1.9),
            ("growth", 1.7),
            ("breakout", 1.8),
            ("strong", 1.6),
            ("buy", 1.0),
            ("hodl", 1.2),
            ("accumulate", 1.2),
            ("recovery", 1.5),
            ("rebound", 1.4),
            ("ath", 2.0),
            ("bearish", -2.5),
            ("dump", -2.0),
            ("dumping", -2.2),
            ("crash", -2.8),
            ("crashing", -2.9),
            ("plunge", -2.4),
            ("drop", -1.5),
            ("decline", -1.6),
            ("loss", -1.9),
            ("losses", -1.9),
            ("weak", -1.6),
            ("sell", -1.0),
            ("fear", -2.2),
            ("panic", -2.3),
            ("rekt", -2.5),
            ("rug", -2.8),
            ("scam", -3.0),
            ("fraud", -3.0),
            ("hack", -2.4),
            ("exploit", -2.2),
            ("fud", -1.8),
        ]
        .into_iter()
        .collect();

        let negations = vec![
            "not", "no", "never", "neither", "nobody", "nothing", "none", "cannot", "cant",
            "can't", "don't", "dont", "doesn't", "doesnt", "didn't", "didnt", "won't", "wont",
            "isn't", "isnt", "aren't", "arent", "wasn't", "wasnt", "hardly", "barely",
        ];

        let intensifiers: HashMap<&'static str, f64> = [
            ("very", 1.3),
            ("extremely", 1.5),
            ("super", 1.3),
            ("really", 1.2),
            ("so", 1.2),
            ("incredibly", 1.5),
            ("massively", 1.4),
            ("slightly", 0.7),
            ("somewhat", 0.8),
            ("kinda", 0.8),
        ]
        .into_iter()
        .collect();

        Self {
            words,
            negations,
            intensifiers,
        }
    }

    /// Compound score of one text in [-1, 1].
    pub fn compound(&self, text: &str) -> f64 {
        let mut total = 0.0;
        let mut negate_next = false;
        let mut scale = 1.0;

        for raw in text.split_whitespace() {
            let word = raw
                .trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
                .to_lowercase();
            if word.is_empty() {
                continue;
            }

            if self.negations.contains(&word.as_str()) {
                negate_next = true;
                continue;
            }
            if let Some(mult) = self.intensifiers.get(word.as_str()) {
                scale *= mult;
                continue;
            }
            if let Some(valence) = self.words.get(word.as_str()) {
                let mut score = valence * scale;
                if negate_next {
                    score *= NEGATION_SCALAR;
                }
                total += score;
            }
            negate_next = false;
            scale = 1.0;
        }

        normalize(total)
    }

    /// Mean compound score; 0.0 for no texts.
    pub fn mean(&self, texts: &[String]) -> f64 {
        if texts.is_empty() {
            return 0.0;
        }
        texts.iter().map(|t| self.compound(t)).sum::<f64>() / texts.len() as f64
    }
}

fn normalize(score: f64) -> f64 {
    if score == 0.0 {
        return 0.0;
    }
    (score / (score * score + NORMALIZATION_ALPHA).sqrt()).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polarity_follows_words() {
        let scorer = LexiconScorer::new();
        assert!(scorer.compound("SOL looking bullish, breakout soon") > 0.0);
        assert!(scorer.compound("total rug, this is a scam") < 0.0);
        assert_eq!(scorer.compound("the validator set updated today"), 0.0);
    }

    #[test]
    fn negation_flips_and_dampens() {
        let scorer = LexiconScorer::new();
        let plain = scorer.compound("bullish");
        let negated = scorer.compound("not bullish");
        assert!(negated < 0.0);
        assert!(negated.abs() < plain.abs());
    }

    #[test]
    fn intensifier_strengthens() {
        let scorer = LexiconScorer::new();
        assert!(scorer.compound("extremely bullish") > scorer.compound("bullish"));
        assert!(scorer.compound("slightly bullish") < scorer.compound("bullish"));
    }

    #[test]
    fn compound_is_bounded() {
        let scorer = LexiconScorer::new();
        let text = "best best best amazing awesome love great moon ".repeat(20);
        let score = scorer.compound(&text);
        assert!(score <= 1.0 && score > 0.9);
    }

    #[test]
    fn mean_of_nothing_is_zero() {
        assert_eq!(LexiconScorer::new().mean(&[]), 0.0);
    }
}
