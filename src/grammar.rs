use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::modifiers::Modifier;
use crate::symbol::{Rule, Symbol};
use crate::utils::{GrammarError, Result};

// Reserved grammar characters
const SYMBOL_START: char = '{';
const SYMBOL_END: char = '}';
const ACTION_START: char = '[';
const ACTION_END: char = ']';
const ACTION_OPERATOR: char = ':';
const ACTION_ADD: char = '+';
const ACTION_SUBTRACT: char = '-';
const ACTION_RESET: char = '!';
const MULTIPLE_ACTION_DELIMITER: char = ',';
const REGEX_DELIMITER: char = '#';
const MODIFIER_OPERATOR: char = '.';

/// The default start symbol used by [`Grammar::flatten`].
pub const ORIGIN_KEY: &str = "origin";

/// Configuration options for grammar behavior
#[derive(Debug, Clone)]
pub struct GrammarConfig {
    /// Maximum nesting depth for reference expansion. A cyclic grammar
    /// (e.g. a symbol that unconditionally references itself) fails with
    /// [`GrammarError::DepthExceeded`] instead of diverging.
    pub max_expansion_depth: usize,
}

impl Default for GrammarConfig {
    fn default() -> Self {
        GrammarConfig {
            max_expansion_depth: 100,
        }
    }
}

/// A parsed `name(arg1,arg2)` modifier token from a reference key.
#[derive(Debug, Clone)]
struct ModifierCall {
    name: String,
    args: Vec<String>,
}

/// A grammar is a dictionary of symbols plus the shared random source that
/// drives every selection.
///
/// Symbols live in two tables: the static table, populated by
/// [`Grammar::add_symbol`] or JSON loading, and the runtime table, created
/// only by in-text actions during expansion. References resolve against
/// the static table first, then the runtime table.
///
/// Text is expanded by rewriting one tag per pass until none remain. A tag
/// is either a symbol reference between `{` and `}` (with an optional
/// `#regex#` rule filter and a `.modifier` chain) or an action between `[`
/// and `]` that mutates the symbol tables and produces no text.
///
/// # Example
///
/// ```
/// use storygen::Grammar;
///
/// let mut grammar = Grammar::with_seed(0);
/// grammar.add_symbol("origin", &["The color is {color}."]).unwrap();
/// grammar.add_symbol("color", &["purple", "orange"]).unwrap();
///
/// let text = grammar.flatten().unwrap();
/// assert!(text == "The color is purple." || text == "The color is orange.");
/// ```
#[derive(Debug, Clone)]
pub struct Grammar {
    /// Author-declared symbols
    symbols: BTreeMap<String, Symbol>,
    /// Symbols created by actions during expansion
    runtime_symbols: BTreeMap<String, Symbol>,
    /// The shared random source for selections and modifiers
    rng: StdRng,
    config: GrammarConfig,
}

impl Default for Grammar {
    fn default() -> Self {
        Self::new()
    }
}

impl Grammar {
    /// Create an empty grammar with an entropy-seeded random source.
    pub fn new() -> Self {
        Grammar {
            symbols: BTreeMap::new(),
            runtime_symbols: BTreeMap::new(),
            rng: StdRng::from_entropy(),
            config: GrammarConfig::default(),
        }
    }

    /// Create an empty grammar with the given seed, for reproducible
    /// expansion.
    pub fn with_seed(seed: u64) -> Self {
        let mut grammar = Grammar::new();
        grammar.set_seed(seed);
        grammar
    }

    /// Create an empty grammar with custom configuration.
    pub fn with_config(config: GrammarConfig) -> Self {
        Grammar {
            config,
            ..Grammar::new()
        }
    }

    /// Create a grammar from a JSON object mapping each symbol key to an
    /// array of rule texts.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut grammar = Grammar::new();
        grammar.load_json(json)?;
        Ok(grammar)
    }

    /// Create a seeded grammar from a JSON string.
    pub fn from_json_seeded(seed: u64, json: &str) -> Result<Self> {
        let mut grammar = Grammar::with_seed(seed);
        grammar.load_json(json)?;
        Ok(grammar)
    }

    /// Create a grammar from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Replace the shared random source with one seeded from `seed`.
    pub fn set_seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Get a reference to the grammar's configuration
    pub fn config(&self) -> &GrammarConfig {
        &self.config
    }

    /// Set a new configuration
    pub fn set_config(&mut self, config: GrammarConfig) {
        self.config = config;
    }

    /// Declare or replace a static symbol. Fails with a syntax error on an
    /// empty key, an empty ruleset, an empty rule text, or declared
    /// weights summing above 100.
    pub fn add_symbol<S: AsRef<str>>(&mut self, key: &str, rules: &[S]) -> Result<&mut Self> {
        let ruleset = rules
            .iter()
            .map(|rule| Rule::new(rule.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        let symbol = Symbol::new(key, ruleset)?;
        self.symbols.insert(key.to_string(), symbol);
        Ok(self)
    }

    /// Check whether a key resolves, in either table.
    pub fn has_symbol(&self, key: &str) -> bool {
        self.symbols.contains_key(key) || self.runtime_symbols.contains_key(key)
    }

    /// Flatten and expand the `origin` symbol.
    pub fn flatten(&mut self) -> Result<String> {
        self.flatten_from(ORIGIN_KEY)
    }

    /// Flatten and expand the given start symbol: its raw rules are joined
    /// with a single space and the result fully expanded. The start symbol
    /// is looked up in the static table only.
    pub fn flatten_from(&mut self, start_key: &str) -> Result<String> {
        let story = match self.symbols.get(start_key) {
            Some(symbol) => symbol
                .ruleset()
                .iter()
                .map(Rule::text)
                .collect::<Vec<_>>()
                .join(" "),
            None => return Err(GrammarError::SymbolNotFound(start_key.to_string())),
        };

        self.expand(&story)
    }

    /// Fully expand the given text: the returned string contains no symbol
    /// references and no actions.
    pub fn expand(&mut self, text: &str) -> Result<String> {
        self.expand_with_depth(text, 0)
    }

    fn expand_with_depth(&mut self, text: &str, depth: usize) -> Result<String> {
        if depth > self.config.max_expansion_depth {
            return Err(GrammarError::DepthExceeded(self.config.max_expansion_depth));
        }

        let mut result = text.to_string();

        while result.contains(SYMBOL_START) || result.contains(ACTION_START) {
            result = self.rewrite_first_tag(&result, depth)?;
        }

        Ok(result)
    }

    /// Resolve one tag and splice the result into the text.
    ///
    /// The scan runs left to right, remembering the most recently opened
    /// symbol and action delimiters so the innermost open tag wins, and
    /// masking everything between a pair of regex delimiters so regex
    /// contents never start or close a tag.
    fn rewrite_first_tag(&mut self, text: &str, depth: usize) -> Result<String> {
        let chars: Vec<char> = text.chars().collect();

        let mut symbol_open: Option<usize> = None;
        let mut action_open: Option<usize> = None;
        let mut inside_regex = false;

        for (index, &c) in chars.iter().enumerate() {
            if c == REGEX_DELIMITER {
                inside_regex = !inside_regex;
                continue;
            }

            if inside_regex {
                continue;
            }

            match c {
                SYMBOL_START => symbol_open = Some(index),
                ACTION_START => action_open = Some(index),

                SYMBOL_END => {
                    let open = symbol_open
                        .ok_or_else(|| GrammarError::MalformedTag(text.to_string()))?;

                    let key: String = chars[open + 1..index].iter().collect();
                    let expanded = self.resolve_reference(&key, depth)?;

                    let mut start = open;
                    let mut end = index + 1;

                    // a modifier can empty the expansion, which would leave
                    // two spaces between the surrounding words; consume the
                    // space before the tag, or failing that the one after
                    if expanded.is_empty() {
                        if start > 0 && chars[start - 1] == ' ' {
                            start -= 1;
                        } else if end < chars.len() && chars[end] == ' ' {
                            end += 1;
                        }
                    }

                    let mut result = String::with_capacity(text.len() + expanded.len());
                    result.extend(chars[..start].iter());
                    result.push_str(&expanded);
                    result.extend(chars[end..].iter());
                    return Ok(result);
                }

                ACTION_END => {
                    let open = action_open
                        .ok_or_else(|| GrammarError::MalformedTag(text.to_string()))?;

                    let body: String = chars[open + 1..index].iter().collect();
                    self.apply_action(&body)?;

                    // actions contribute no text
                    let mut result = String::with_capacity(text.len());
                    result.extend(chars[..open].iter());
                    result.extend(chars[index + 1..].iter());
                    return Ok(result);
                }

                _ => {}
            }
        }

        // an open delimiter exists but the scan found no balanced close
        Err(GrammarError::MalformedTag(text.to_string()))
    }

    /// Fully expand one symbol reference.
    ///
    /// `key` has the maximal form `name#regex#.mod1.mod2(args)`.
    fn resolve_reference(&mut self, key: &str, depth: usize) -> Result<String> {
        let (name, regex, modifier_chain) = parse_reference(key)?;

        let selected = match self.special_symbol(&name, &regex) {
            Some(text) => text,
            None => {
                let symbol = self
                    .symbols
                    .get(&name)
                    .or_else(|| self.runtime_symbols.get(&name))
                    .ok_or_else(|| GrammarError::SymbolNotFound(name.clone()))?;

                symbol.select_rule(&regex, &mut self.rng)?.text().to_string()
            }
        };

        // expand the selected rule too, in case of nested references
        let mut expanded = self.expand_with_depth(&selected, depth + 1)?;

        for call in &modifier_chain {
            let modifier = Modifier::from_name(&call.name)?;
            let args: Vec<&str> = call.args.iter().map(String::as_str).collect();
            expanded = modifier.apply(&mut self.rng, &expanded, &args)?;
        }

        Ok(expanded)
    }

    /// Special symbols produce programmatic values instead of selecting
    /// from a ruleset. `num` yields the decimal text of a non-negative
    /// random integer.
    fn special_symbol(&mut self, name: &str, _regex: &str) -> Option<String> {
        match name {
            "num" => Some(self.rng.gen_range(0..i32::MAX).to_string()),
            _ => None,
        }
    }

    /// Apply one action directive, of the maximal form
    /// `!key:+rule1,-rule2,rule3`.
    ///
    /// Rules prefixed with `-` form the subtract set; the rest (with any
    /// `+` stripped) form the add set. A reset (`!`) or an unknown key
    /// installs a runtime symbol holding exactly the add set; otherwise
    /// the static symbol is rebuilt as `(existing - subtract) + add`.
    fn apply_action(&mut self, body: &str) -> Result<()> {
        if body.is_empty() {
            return Ok(());
        }

        let (key_part, rules_part) = body
            .split_once(ACTION_OPERATOR)
            .ok_or_else(|| GrammarError::MalformedTag(body.to_string()))?;

        let mut add = Vec::new();
        let mut subtract = Vec::new();

        for token in rules_part.split(MULTIPLE_ACTION_DELIMITER) {
            match token.strip_prefix(ACTION_SUBTRACT) {
                Some(rest) => subtract.push(Rule::new(rest)?),
                None => {
                    let text = token.strip_prefix(ACTION_ADD).unwrap_or(token);
                    add.push(Rule::new(text)?);
                }
            }
        }

        let (reset, key) = match key_part.strip_prefix(ACTION_RESET) {
            Some(rest) => (true, rest),
            None => (false, key_part),
        };

        if reset || !self.symbols.contains_key(key) {
            if reset {
                // a reset discards any static declaration for the key
                self.symbols.remove(key);
            }

            let symbol = Symbol::new(key, add)?;
            self.runtime_symbols.insert(key.to_string(), symbol);
            return Ok(());
        }

        let mut ruleset: Vec<Rule> = match self.symbols.get(key) {
            Some(existing) => existing
                .ruleset()
                .iter()
                .filter(|rule| !subtract.iter().any(|s| s.text() == rule.text()))
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        ruleset.extend(add);

        let symbol = Symbol::new(key, ruleset)?;
        self.symbols.insert(key.to_string(), symbol);
        Ok(())
    }

    /// Replace this grammar's symbols with the ones in the given JSON
    /// object. The runtime table is cleared.
    pub fn load_json(&mut self, json: &str) -> Result<()> {
        let table: BTreeMap<String, Vec<String>> = serde_json::from_str(json)?;

        self.symbols.clear();
        self.runtime_symbols.clear();

        for (key, rules) in table {
            self.add_symbol(&key, &rules)?;
        }

        Ok(())
    }

    /// Serialize the static symbol table as a JSON object mapping each key
    /// to the ordered array of its raw rule texts.
    pub fn to_json(&self) -> Result<String> {
        let table: BTreeMap<&str, Vec<&str>> = self
            .symbols
            .iter()
            .map(|(key, symbol)| {
                (
                    key.as_str(),
                    symbol.ruleset().iter().map(Rule::text).collect(),
                )
            })
            .collect();

        Ok(serde_json::to_string_pretty(&table)?)
    }
}

/// Split a reference key into the symbol name, the optional regex filter,
/// and the modifier chain. The modifier chain starts at the first `.`
/// outside the regex literal.
fn parse_reference(key: &str) -> Result<(String, String, Vec<ModifierCall>)> {
    let mut inside_regex = false;
    let mut chain_start = None;

    for (i, c) in key.char_indices() {
        if c == REGEX_DELIMITER {
            inside_regex = !inside_regex;
            continue;
        }
        if inside_regex {
            continue;
        }
        if c == MODIFIER_OPERATOR {
            chain_start = Some(i);
            break;
        }
    }

    let (head, chain) = match chain_start {
        Some(i) => (&key[..i], &key[i + 1..]),
        None => (key, ""),
    };

    let (name, regex) = match head.split_once(REGEX_DELIMITER) {
        Some((name, rest)) => {
            let regex = rest
                .strip_suffix(REGEX_DELIMITER)
                .ok_or_else(|| GrammarError::MalformedTag(key.to_string()))?;
            (name, regex)
        }
        None => (head, ""),
    };

    let mut calls = Vec::new();
    if !chain.is_empty() {
        for token in chain.split(MODIFIER_OPERATOR) {
            calls.push(parse_modifier_token(token));
        }
    }

    Ok((name.to_string(), regex.to_string(), calls))
}

fn parse_modifier_token(token: &str) -> ModifierCall {
    match token.split_once('(') {
        Some((name, rest)) => {
            let inner = rest.strip_suffix(')').unwrap_or(rest);
            let args = if inner.is_empty() {
                Vec::new()
            } else {
                inner.split(',').map(str::to_string).collect()
            };
            ModifierCall {
                name: name.to_string(),
                args,
            }
        }
        None => ModifierCall {
            name: token.to_string(),
            args: Vec::new(),
        },
    }
}

/// Builder for constructing Grammar instances
pub struct GrammarBuilder {
    grammar: Grammar,
}

impl Default for GrammarBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GrammarBuilder {
    /// Create a new grammar builder
    pub fn new() -> Self {
        GrammarBuilder {
            grammar: Grammar::new(),
        }
    }

    /// Seed the grammar's random source
    pub fn seed(mut self, seed: u64) -> Self {
        self.grammar.set_seed(seed);
        self
    }

    /// Set the configuration
    pub fn config(mut self, config: GrammarConfig) -> Self {
        self.grammar.config = config;
        self
    }

    /// Declare a static symbol
    pub fn symbol(mut self, key: &str, rules: &[&str]) -> Self {
        // Ignore errors in builder pattern for simplicity
        let _ = self.grammar.add_symbol(key, rules);
        self
    }

    /// Build the grammar
    pub fn build(self) -> Grammar {
        self.grammar
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_without_tags_is_identity() {
        let mut grammar = Grammar::with_seed(0);
        assert_eq!(grammar.expand("plain text").unwrap(), "plain text");
    }

    #[test]
    fn test_flatten_joins_ruleset_with_spaces() {
        let mut grammar = Grammar::with_seed(0);
        grammar.add_symbol("animal", &["unicorn", "raven"]).unwrap();

        assert_eq!(grammar.flatten_from("animal").unwrap(), "unicorn raven");
    }

    #[test]
    fn test_nested_references() {
        let mut grammar = Grammar::with_seed(0);
        grammar.add_symbol("animal", &["{bird}"]).unwrap();
        grammar.add_symbol("bird", &["raven"]).unwrap();

        assert_eq!(grammar.flatten_from("animal").unwrap(), "raven");
    }

    #[test]
    fn test_modifier_chain() {
        let mut grammar = Grammar::with_seed(0);
        grammar.add_symbol("name", &["unicorn"]).unwrap();
        grammar.add_symbol("origin", &["{name.capitalize.s}"]).unwrap();

        assert_eq!(grammar.flatten().unwrap(), "Unicorns");
    }

    #[test]
    fn test_regex_filter_masks_delimiters() {
        // the '.' inside the regex literal must not start a modifier chain
        let mut grammar = Grammar::with_seed(0);
        grammar.add_symbol("animal", &["cow", "sparrow"]).unwrap();
        grammar.add_symbol("origin", &["{animal#c.w#}"]).unwrap();

        for seed in 0..15 {
            grammar.set_seed(seed);
            assert_eq!(grammar.flatten().unwrap(), "cow");
        }
    }

    #[test]
    fn test_empty_expansion_consumes_leading_space() {
        let mut grammar = Grammar::with_seed(0);
        grammar.add_symbol("name", &["cat"]).unwrap();
        grammar
            .add_symbol("origin", &["left {name.optional(0)} right"])
            .unwrap();

        assert_eq!(grammar.flatten().unwrap(), "left right");
    }

    #[test]
    fn test_empty_expansion_consumes_trailing_space_at_start() {
        let mut grammar = Grammar::with_seed(0);
        grammar.add_symbol("name", &["cat"]).unwrap();
        grammar
            .add_symbol("origin", &["{name.optional(0)} right"])
            .unwrap();

        assert_eq!(grammar.flatten().unwrap(), "right");
    }

    #[test]
    fn test_action_creates_runtime_symbol() {
        let mut grammar = Grammar::with_seed(0);
        grammar.add_symbol("origin", &["[hero:Izzi]{hero}"]).unwrap();

        assert_eq!(grammar.flatten().unwrap(), "Izzi");
        assert!(grammar.has_symbol("hero"));
    }

    #[test]
    fn test_action_add_and_remove_rules() {
        let mut grammar = Grammar::with_seed(0);
        grammar.add_symbol("mood", &["happy"]).unwrap();
        grammar
            .add_symbol("origin", &["[mood:-happy,+sad]{mood}"])
            .unwrap();

        assert_eq!(grammar.flatten().unwrap(), "sad");
    }

    #[test]
    fn test_action_reset_replaces_static_symbol() {
        let mut grammar = Grammar::with_seed(0);
        grammar.add_symbol("mood", &["happy", "cheerful"]).unwrap();
        grammar.add_symbol("origin", &["[!mood:sad]{mood}"]).unwrap();

        assert_eq!(grammar.flatten().unwrap(), "sad");
    }

    #[test]
    fn test_action_inside_symbol_tag() {
        // the inner symbol expands first, then the action, then the outer tag
        let mut grammar = Grammar::with_seed(0);
        grammar.add_symbol("name", &["Izzi"]).unwrap();
        grammar
            .add_symbol("origin", &["{[hero:{name}]hero}"])
            .unwrap();

        assert_eq!(grammar.flatten().unwrap(), "Izzi");
    }

    #[test]
    fn test_empty_action_is_noop() {
        let mut grammar = Grammar::with_seed(0);
        grammar.add_symbol("origin", &["a[]b"]).unwrap();

        assert_eq!(grammar.flatten().unwrap(), "ab");
    }

    #[test]
    fn test_num_special_symbol() {
        let mut grammar = Grammar::with_seed(5);
        grammar.add_symbol("origin", &["{num}"]).unwrap();

        let text = grammar.flatten().unwrap();
        let value: i32 = text.parse().unwrap();
        assert!(value >= 0);
    }

    #[test]
    fn test_unbalanced_symbol_tag() {
        let mut grammar = Grammar::with_seed(0);
        let result = grammar.expand("broken {tag");
        assert!(matches!(result, Err(GrammarError::MalformedTag(_))));
    }

    #[test]
    fn test_action_without_separator() {
        let mut grammar = Grammar::with_seed(0);
        let result = grammar.expand("[oops]");
        assert!(matches!(result, Err(GrammarError::MalformedTag(_))));
    }

    #[test]
    fn test_missing_symbol() {
        let mut grammar = Grammar::with_seed(0);
        grammar.add_symbol("origin", &["{nowhere}"]).unwrap();

        let result = grammar.flatten();
        assert!(matches!(result, Err(GrammarError::SymbolNotFound(key)) if key == "nowhere"));
    }

    #[test]
    fn test_flatten_without_start_symbol() {
        let mut grammar = Grammar::with_seed(0);
        let result = grammar.flatten();
        assert!(matches!(result, Err(GrammarError::SymbolNotFound(key)) if key == "origin"));
    }

    #[test]
    fn test_unknown_modifier_in_reference() {
        let mut grammar = Grammar::with_seed(0);
        grammar.add_symbol("name", &["text"]).unwrap();
        grammar.add_symbol("origin", &["{name.shout}"]).unwrap();

        let result = grammar.flatten();
        assert!(matches!(result, Err(GrammarError::ModifierNotFound(_))));
    }

    #[test]
    fn test_cyclic_grammar_hits_depth_limit() {
        let mut grammar = Grammar::with_seed(0);
        grammar.set_config(GrammarConfig {
            max_expansion_depth: 10,
        });
        grammar.add_symbol("origin", &["loop {origin}"]).unwrap();

        let result = grammar.flatten();
        assert!(matches!(result, Err(GrammarError::DepthExceeded(10))));
    }

    #[test]
    fn test_builder() {
        let mut grammar = GrammarBuilder::new()
            .seed(0)
            .symbol("origin", &["Hello {subject}"])
            .symbol("subject", &["world"])
            .symbol("subject", &["Rust"])
            .build();

        // a repeated key replaces the earlier declaration
        assert_eq!(grammar.flatten().unwrap(), "Hello Rust");
    }

    #[test]
    fn test_parse_reference_forms() {
        let (name, regex, mods) = parse_reference("animal").unwrap();
        assert_eq!((name.as_str(), regex.as_str(), mods.len()), ("animal", "", 0));

        let (name, regex, mods) = parse_reference("animal#c.w#").unwrap();
        assert_eq!((name.as_str(), regex.as_str(), mods.len()), ("animal", "c.w", 0));

        let (name, regex, mods) = parse_reference("animal#c.w#.capitalize.s").unwrap();
        assert_eq!(name, "animal");
        assert_eq!(regex, "c.w");
        assert_eq!(mods[0].name, "capitalize");
        assert_eq!(mods[1].name, "s");

        let (_, _, mods) = parse_reference("name.optional(25)").unwrap();
        assert_eq!(mods[0].name, "optional");
        assert_eq!(mods[0].args, vec!["25"]);
    }

    #[test]
    fn test_unterminated_regex_literal() {
        assert!(matches!(
            parse_reference("animal#cw"),
            Err(GrammarError::MalformedTag(_))
        ));
    }
}
