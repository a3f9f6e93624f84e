//! Crate-level macro expansion.
//!
//! A single pass in textual order: `macro_rules!` definitions register as
//! they are met, macro-invocation items are matched and replaced by the
//! parsed expansion (which is immediately re-examined, so macros may define
//! macros). Expression-position invocations are expanded on demand via
//! [`expand_expr_macro`].

use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::{ExprRef, Item, ItemKind, MacroInvocation};
use crate::error::{PResult, ParseError, ParseErrorKind};
use crate::intern::Symbol;
use crate::macros::{invoke_rules, MacroRulesDef};
use crate::parser::{ExprParsing, ItemParsing, Parser};

/// Hard stop for runaway recursive expansions.
const RECURSION_LIMIT: usize = 128;

#[derive(Default)]
pub struct MacroRegistry {
    defs: HashMap<Symbol, Rc<MacroRulesDef>>,
}

impl MacroRegistry {
    pub fn new() -> MacroRegistry {
        MacroRegistry::default()
    }

    pub fn define(&mut self, def: Rc<MacroRulesDef>) {
        self.defs.insert(def.name, def);
    }

    pub fn lookup(&self, name: Symbol) -> Option<Rc<MacroRulesDef>> {
        self.defs.get(&name).cloned()
    }

    fn lookup_invocation(&self, mac: &MacroInvocation) -> PResult<Rc<MacroRulesDef>> {
        let name = mac
            .path
            .last_ident()
            .map(|i| i.name)
            .ok_or_else(|| ParseError::todo("macro invocation with empty path", mac.span))?;
        self.lookup(name).ok_or_else(|| {
            ParseError::new(
                ParseErrorKind::MacroMatchFailed {
                    macro_name: name.resolve().to_string(),
                },
                mac.span,
            )
        })
    }
}

/// Expand every item-position macro in `items`, registering definitions as
/// they appear. `crate_name` feeds `$crate`.
pub fn expand_crate(items: &mut Vec<Item>, crate_name: &str) -> PResult<MacroRegistry> {
    let mut registry = MacroRegistry::new();
    let mut budget = RECURSION_LIMIT;
    expand_items(&mut registry, items, crate_name, &mut budget)?;
    Ok(registry)
}

fn expand_items(
    registry: &mut MacroRegistry,
    items: &mut Vec<Item>,
    crate_name: &str,
    budget: &mut usize,
) -> PResult<()> {
    let mut i = 0;
    while i < items.len() {
        match &mut items[i].kind {
            ItemKind::MacroDef { rules, .. } => {
                let mut def = (**rules).clone();
                def.crate_name = Some(crate_name.to_string());
                registry.define(Rc::new(def));
                i += 1;
            }
            ItemKind::MacroInvocation(mac) => {
                if *budget == 0 {
                    return Err(ParseError::todo(
                        "macro expansion recursion limit reached",
                        mac.span,
                    ));
                }
                *budget -= 1;
                let mac = mac.clone();
                let def = registry.lookup_invocation(&mac)?;
                let expander = invoke_rules(&def, &mac.input, mac.span)?;
                let mut parser = Parser::new(expander);
                let (_inner, new_items) = parser.parse_mod_items(true)?;
                items.splice(i..i + 1, new_items);
                // Do not advance: the spliced items are re-examined, so
                // expansions may define further macros or invoke again.
            }
            ItemKind::Module {
                items: Some(sub), ..
            } => {
                expand_items(registry, sub, crate_name, budget)?;
                i += 1;
            }
            _ => i += 1,
        }
    }
    Ok(())
}

/// Expand an expression-position invocation and parse the result as an
/// expression.
pub fn expand_expr_macro(
    registry: &MacroRegistry,
    mac: &MacroInvocation,
) -> PResult<ExprRef> {
    let def = registry.lookup_invocation(mac)?;
    let expander = invoke_rules(&def, &mac.input, mac.span)?;
    let mut parser = Parser::new(expander);
    let expr = parser.parse_expr()?;
    let tok = parser.get()?;
    if !tok.is_eof() {
        return Err(ParseError::unexpected(
            tok.kind,
            "end of macro expansion",
            tok.span,
        ));
    }
    Ok(expr)
}
