//! Macro expansion: a token source that walks a rule body, splicing
//! captured token trees with nested repetition.

use std::rc::Rc;

use crate::error::{PResult, ParseError, ParseErrorKind};
use crate::hygiene::Hygiene;
use crate::intern::Symbol;
use crate::stream::{OwnedTtStream, TokenSource};
use crate::token::{Edition, Position, Span, Token, TokenKind};
use crate::tokentree::TokenTree;

use super::def::{MacroRule, MacroRuleEnt, MacroRulesDef};
use super::matcher::{Captures, CountResult};

#[derive(Clone, Copy)]
struct Offset {
    read_pos: usize,
    loop_index: usize,
    max_index: usize,
}

pub struct MacroExpander {
    /// Position records name the defining macro, not the invocation site.
    macro_file: Symbol,
    crate_name: Option<String>,
    root: Rc<Vec<MacroRuleEnt>>,
    caps: Captures,
    /// One entry per active layer: read position and iteration state.
    offsets: Vec<Offset>,
    /// Current iteration index per layer, for capture lookup.
    layer_iters: Vec<usize>,
    next_tokens: Vec<Token>,
    ttstream: Option<OwnedTtStream>,
    edition: Edition,
    hygiene: Hygiene,
}

impl MacroExpander {
    pub fn new(def: &MacroRulesDef, rule: &MacroRule, caps: Captures) -> MacroExpander {
        let layer_iters = vec![0; caps.layer_count()];
        MacroExpander {
            macro_file: Symbol::intern(&format!("Macro:{}", def.name)),
            crate_name: def.crate_name.clone(),
            root: Rc::new(rule.body.clone()),
            caps,
            offsets: vec![Offset {
                read_pos: 0,
                loop_index: 0,
                max_index: 0,
            }],
            layer_iters,
            next_tokens: Vec::new(),
            ttstream: None,
            edition: Edition::default(),
            hygiene: Hygiene::new_scope(),
        }
    }

    fn position(&self) -> Span {
        let ofs = self.offsets.first().map(|o| o.read_pos).unwrap_or(0);
        Span::point(self.macro_file, Position::new(1, ofs as u32))
    }

    /// The entry list the top offset iterates over.
    fn cur_ents<'a>(root: &'a [MacroRuleEnt], offsets: &[Offset]) -> &'a [MacroRuleEnt] {
        let mut ents = root;
        for ofs in &offsets[..offsets.len() - 1] {
            let idx = ofs.read_pos - 1;
            match &ents[idx] {
                MacroRuleEnt::Loop { ents: sub, .. } => ents = sub,
                _ => unreachable!("offset path descends through a non-loop entry"),
            }
        }
        ents
    }

    /// The loop entry the top layer is an iteration of.
    fn cur_layer_ent<'a>(root: &'a [MacroRuleEnt], offsets: &[Offset]) -> &'a MacroRuleEnt {
        debug_assert!(offsets.len() > 1);
        let mut ents = root;
        for ofs in &offsets[..offsets.len() - 2] {
            let idx = ofs.read_pos - 1;
            match &ents[idx] {
                MacroRuleEnt::Loop { ents: sub, .. } => ents = sub,
                _ => unreachable!(),
            }
        }
        &ents[offsets[offsets.len() - 2].read_pos - 1]
    }

    /// Resolve a loop's iteration count: every capture referenced inside at
    /// the child layer must agree.
    fn count_repeats(
        caps: &Captures,
        ents: &[MacroRuleEnt],
        layer: usize,
    ) -> PResult<Option<usize>> {
        let mut found: Option<usize> = None;
        for ent in ents {
            let c = match ent {
                MacroRuleEnt::Name(name) => match caps.count(layer, *name) {
                    CountResult::Ignore => None,
                    CountResult::Count(n) => Some(n),
                },
                MacroRuleEnt::Loop { ents: sub, .. } => {
                    Self::count_repeats(caps, sub, layer)?
                }
                _ => None,
            };
            if let Some(c) = c {
                match found {
                    None => found = Some(c),
                    Some(prev) if prev == c => {}
                    Some(_) => {
                        return Err(ParseError::new(
                            ParseErrorKind::IterationCountMismatch,
                            Span::null(),
                        ))
                    }
                }
            }
        }
        Ok(found)
    }

    fn splice_capture(&mut self, tt: &TokenTree) -> PResult<Token> {
        self.edition = tt.edition();
        self.hygiene = tt.hygiene().clone();
        // Wrap in a transparent group so a captured group re-emits its own
        // delimiters (the root group of a stream never does).
        let root = TokenTree::seq(tt.edition(), tt.hygiene().clone(), vec![tt.clone()]);
        let mut stream = OwnedTtStream::new(Rc::new(root));
        let tok = stream.next_token()?;
        self.ttstream = Some(stream);
        Ok(tok)
    }
}

impl TokenSource for MacroExpander {
    fn next_token(&mut self) -> PResult<Token> {
        if let Some(tok) = self.next_tokens.pop() {
            return Ok(tok);
        }
        if let Some(stream) = &mut self.ttstream {
            let tok = stream.next_token()?;
            if !tok.is_eof() {
                self.edition = stream.source_edition();
                self.hygiene = stream.source_hygiene();
                return Ok(tok);
            }
            self.ttstream = None;
        }

        let root = self.root.clone();
        while !self.offsets.is_empty() {
            let layer = self.offsets.len() - 1;
            let ents = Self::cur_ents(&root, &self.offsets);
            let idx = {
                let top = self.offsets.last_mut().unwrap();
                let idx = top.read_pos;
                top.read_pos += 1;
                idx
            };

            if idx < ents.len() {
                match &ents[idx] {
                    MacroRuleEnt::CrateRef => {
                        if let Some(name) = self.crate_name.clone() {
                            let span = self.position();
                            self.next_tokens.push(Token::new(TokenKind::Str(name), span));
                            return Ok(Token::new(TokenKind::DoubleColon, span));
                        }
                        // No crate identity: `$crate` contributes nothing.
                    }
                    MacroRuleEnt::Name(name) => {
                        let name = *name;
                        let mut search_layer = layer;
                        let tt = loop {
                            let iter_idx = self.offsets[search_layer].loop_index;
                            match self.caps.get(search_layer, name, iter_idx)? {
                                Some(tt) => break Some(tt.clone()),
                                None => {
                                    if search_layer == 0 {
                                        break None;
                                    }
                                    search_layer -= 1;
                                }
                            }
                        };
                        match tt {
                            Some(tt) => return self.splice_capture(&tt),
                            None => {
                                return Err(ParseError::new(
                                    ParseErrorKind::MissingCapture {
                                        name: name.resolve().to_string(),
                                    },
                                    self.position(),
                                ))
                            }
                        }
                    }
                    MacroRuleEnt::Loop { ents: sub, .. } => {
                        let num_repeats =
                            Self::count_repeats(&self.caps, sub, layer + 1)?.unwrap_or(0);
                        if num_repeats > 0 {
                            self.offsets.push(Offset {
                                read_pos: 0,
                                loop_index: 0,
                                max_index: num_repeats,
                            });
                            if self.layer_iters.len() <= layer + 1 {
                                self.layer_iters.resize(layer + 2, 0);
                            }
                            self.layer_iters[layer + 1] = 0;
                        }
                    }
                    MacroRuleEnt::Token(tok) => return Ok(tok.clone()),
                }
            } else if layer > 0 {
                let top = self.offsets.last_mut().unwrap();
                if top.loop_index + 1 < top.max_index {
                    // Restart the layer for the next iteration.
                    top.read_pos = 0;
                    top.loop_index += 1;
                    self.layer_iters[layer] += 1;
                    let loop_ent = Self::cur_layer_ent(&root, &self.offsets);
                    if let MacroRuleEnt::Loop { sep: Some(sep), .. } = loop_ent {
                        return Ok(sep.clone());
                    }
                } else {
                    self.offsets.pop();
                }
            } else {
                self.offsets.pop();
            }
        }

        Ok(Token::new(TokenKind::Eof, self.position()))
    }

    fn source_span(&self) -> Span {
        self.position()
    }

    fn source_edition(&self) -> Edition {
        self.edition
    }

    fn source_hygiene(&self) -> Hygiene {
        self.hygiene.clone()
    }
}

/// Drain an expander into a plain token list (diagnostics and tests).
pub fn expand_to_tokens(mut expander: MacroExpander) -> PResult<Vec<Token>> {
    let mut out = Vec::new();
    loop {
        let tok = expander.next_token()?;
        if tok.is_eof() {
            return Ok(out);
        }
        out.push(tok);
    }
}
