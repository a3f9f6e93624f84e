//! The declarative-macro engine.
//!
//! `macro_rules!` definitions are parsed into rule patterns and bodies
//! (`def`), invocations are matched rule-by-rule with speculative streams
//! (`matcher`), and a successful match produces a lazy token source that
//! splices captures into the rule body (`expand`).

mod def;
mod expand;
mod matcher;

pub use def::{
    parse_macro_rules, FragmentKind, LoopKind, MacroPatEnt, MacroRule, MacroRuleEnt,
    MacroRulesDef,
};
pub use expand::{expand_to_tokens, MacroExpander};
pub use matcher::{match_rule, Captures};

use std::rc::Rc;

use crate::error::{PResult, ParseError, ParseErrorKind};
use crate::token::Span;
use crate::tokentree::TokenTree;

/// Try each rule of `def` in source order against the invocation input.
/// The first matching rule yields an expander; if none match, the last
/// rule's failure is reported.
pub fn invoke_rules(
    def: &MacroRulesDef,
    input: &TokenTree,
    span: Span,
) -> PResult<MacroExpander> {
    let input = Rc::new(input.clone());
    let mut last_err = None;
    for rule in &def.rules {
        match match_rule(rule, &input) {
            Ok(caps) => {
                return Ok(MacroExpander::new(def, rule, caps));
            }
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        ParseError::new(
            ParseErrorKind::MacroMatchFailed {
                macro_name: def.name.resolve().to_string(),
            },
            span,
        )
    }))
}
