use std::error::Error;
use storygen::{Grammar, GrammarBuilder};

/// Example of building story grammars programmatically
fn main() -> Result<(), Box<dyn Error>> {
    // Example 1: a small story grammar with modifiers and weights
    let mut grammar = Grammar::new();
    grammar.add_symbol(
        "origin",
        &["{name.capitalize} {verb.ed} past the {place} and saw {animal.a}."],
    )?;
    grammar.add_symbol("name", &["avery", "juno", "mira"])?;
    grammar.add_symbol("verb", &["hurry", "wander", "stroll"])?;
    grammar.add_symbol("place", &["old mill", "river", "orchard"])?;
    grammar.add_symbol("animal", &["owl", "fox(40)", "unicorn(10)"])?;

    println!("Generated stories:");
    for i in 1..=5 {
        println!("{}. {}", i, grammar.flatten()?);
    }

    // Example 2: an action that grows a mood symbol as the story unfolds
    let mut grammar = GrammarBuilder::new()
        .symbol(
            "origin",
            &["[mood:calm]The sea was {mood}. [mood:+restless]By dusk it grew {mood#restless#}."],
        )
        .build();

    println!("\nWith runtime actions:");
    println!("{}", grammar.flatten()?);

    Ok(())
}
