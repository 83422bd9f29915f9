use std::fmt;
use std::ops::Range;

use rand::Rng;
use regex::Regex;

use crate::utils::{GrammarError, Result};

/// A rule is one non-empty candidate expansion for a symbol. The text may
/// contain further symbol references or actions.
///
/// Examples: `"some text"`, `"{name}"`, `"The color is {color}."`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    text: String,
}

impl Rule {
    /// Create a rule, rejecting empty text.
    pub fn new(text: impl Into<String>) -> Result<Rule> {
        let text = text.into();
        if text.is_empty() {
            return Err(GrammarError::Syntax("rule cannot be empty".to_string()));
        }
        Ok(Rule { text })
    }

    /// The raw rule text, as authored (weight annotations included).
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// A symbol is a non-empty key and a non-empty set of expansion rules.
///
/// Each rule may carry a weight percentage in `[0..100]` as a trailing
/// `(N)`, e.g. `"dog(30)", "cat(15)", "mouse", "pig"`. Dog and cat then
/// have a 30% and 15% chance of being selected, while mouse and pig share
/// the remaining 55% uniformly. The weights declared on one symbol may not
/// sum to more than 100.
///
/// A symbol is an immutable value: mutating a ruleset (e.g. through an
/// action) rebuilds the whole symbol rather than editing it in place.
#[derive(Debug, Clone)]
pub struct Symbol {
    key: String,
    ruleset: Vec<Rule>,
    weighted: Vec<(Range<u32>, Rule)>,
    unweighted: Vec<Rule>,
}

/// Split a trailing `(N)` weight annotation off a rule text.
fn split_weight(text: &str) -> Option<(&str, u32)> {
    let rest = text.strip_suffix(')')?;
    let open = rest.rfind('(')?;
    let weight: u32 = rest[open + 1..].parse().ok()?;
    Some((&rest[..open], weight))
}

impl Symbol {
    /// Build a symbol, partitioning its ruleset into weighted and
    /// unweighted rules. Weighted rules are assigned disjoint half-open
    /// ranges over `[0, 100)` in the order they appear.
    pub fn new(key: impl Into<String>, ruleset: Vec<Rule>) -> Result<Symbol> {
        let key = key.into();

        if key.is_empty() {
            return Err(GrammarError::Syntax(
                "symbol key cannot be empty".to_string(),
            ));
        }

        if ruleset.is_empty() {
            return Err(GrammarError::Syntax(format!(
                "ruleset for \"{}\" is empty",
                key
            )));
        }

        let mut weighted = Vec::new();
        let mut unweighted = Vec::new();
        let mut bound: u32 = 0;

        for rule in &ruleset {
            match split_weight(rule.text()) {
                Some((content, weight)) => {
                    weighted.push((bound..bound + weight, Rule::new(content)?));
                    bound += weight;
                }
                None => unweighted.push(rule.clone()),
            }
        }

        if bound > 100 {
            return Err(GrammarError::Syntax(format!(
                "rule distributions for \"{}\" are greater than 100%",
                key
            )));
        }

        Ok(Symbol {
            key,
            ruleset,
            weighted,
            unweighted,
        })
    }

    /// The symbol's key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The raw ruleset, in authored order.
    pub fn ruleset(&self) -> &[Rule] {
        &self.ruleset
    }

    /// Select a single rule from the ruleset.
    ///
    /// With a non-empty regex, the candidates are the rules whose entire
    /// (weight-stripped) text matches, chosen uniformly; weights are not
    /// honored under regex filtering. Without a regex, declared weights are
    /// honored first and the undeclared remainder falls through to a
    /// uniform choice among the unweighted rules.
    pub fn select_rule<R: Rng>(&self, regex: &str, rng: &mut R) -> Result<&Rule> {
        if !regex.is_empty() {
            let re = Regex::new(&format!("^(?:{})$", regex))?;

            let matches: Vec<&Rule> = self
                .weighted
                .iter()
                .map(|(_, rule)| rule)
                .chain(self.unweighted.iter())
                .filter(|rule| re.is_match(rule.text()))
                .collect();

            if matches.is_empty() {
                return Err(GrammarError::NoMatchingRule(self.key.clone()));
            }

            return Ok(matches[rng.gen_range(0..matches.len())]);
        }

        if !self.weighted.is_empty() {
            let draw = rng.gen_range(0..100u32);

            for (range, rule) in &self.weighted {
                if range.contains(&draw) {
                    return Ok(rule);
                }
            }
        }

        if self.unweighted.is_empty() {
            // every rule is weighted and the draw missed all declared ranges
            return Err(GrammarError::NoMatchingRule(self.key.clone()));
        }

        Ok(&self.unweighted[rng.gen_range(0..self.unweighted.len())])
    }
}
