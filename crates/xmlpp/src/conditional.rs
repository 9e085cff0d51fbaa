//! The conditional directives `if`, `ifdef`, `ifndef`, `elseif`, `else` and `endif`
//!
//! Each nesting level of conditional directives has a [Context].
//! Whether a context emits is folded once, when it is pushed, from the contexts
//!     enclosing it, so checking whether a node should be emitted only looks
//!     at the innermost context.

use crate::error::{Error, Kind, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchState {
    Unknown,
    If,
    ElseIf,
    Else,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Context {
    /// Whether all enclosing contexts are emitting.
    pub active: bool,
    /// Whether the current branch of this context is taken.
    pub is_true: bool,
    /// Whether some branch of this context has been taken.
    pub ever_true: bool,
    pub state: BranchState,
}

impl Context {
    fn root() -> Context {
        Context {
            active: true,
            is_true: true,
            ever_true: true,
            state: BranchState::Unknown,
        }
    }

    /// Context pushed inside a branch that is not emitting.
    ///
    /// None of its branches are ever taken and none of its conditions are evaluated.
    fn inert() -> Context {
        Context {
            active: false,
            is_true: false,
            ever_true: true,
            state: BranchState::If,
        }
    }

    fn emitting(&self) -> bool {
        self.active && self.is_true
    }

    fn set_true(&mut self, value: bool) {
        self.is_true = value;
        self.ever_true |= value;
    }
}

/// The stack of conditional contexts of one node stream.
///
/// Documents, included files and foreach iterations each have their own stack.
#[derive(Debug)]
pub struct Stack {
    current: Context,
    parents: Vec<Context>,
}

impl Default for Stack {
    fn default() -> Self {
        Stack {
            current: Context::root(),
            parents: vec![],
        }
    }
}

impl Stack {
    /// Whether nodes at the current position are emitted.
    pub fn emitting(&self) -> bool {
        self.current.emitting()
    }

    pub fn depth(&self) -> usize {
        self.parents.len()
    }

    /// Handles `if`, `ifdef` and `ifndef`.
    ///
    /// The condition is only evaluated if the current position is emitting.
    pub fn push_if<F>(&mut self, condition: F) -> Result<()>
    where
        F: FnOnce() -> Result<bool>,
    {
        let context = if self.emitting() {
            let mut context = Context {
                active: self.current.active && self.current.is_true,
                is_true: false,
                ever_true: false,
                state: BranchState::If,
            };
            context.set_true(condition()?);
            context
        } else {
            Context::inert()
        };
        self.parents.push(self.current);
        self.current = context;
        Ok(())
    }

    /// Handles `elseif`.
    ///
    /// The condition is only evaluated if no earlier branch was taken.
    pub fn else_if<F>(&mut self, condition: F) -> Result<()>
    where
        F: FnOnce() -> Result<bool>,
    {
        self.check_open("elseif")?;
        self.current.state = BranchState::ElseIf;
        if self.current.ever_true {
            self.current.is_true = false;
        } else {
            self.current.set_true(condition()?);
        }
        Ok(())
    }

    /// Handles `else`.
    pub fn else_(&mut self) -> Result<()> {
        self.check_open("else")?;
        self.current.state = BranchState::Else;
        self.current.is_true = !self.current.ever_true;
        Ok(())
    }

    /// Handles `endif`.
    pub fn end_if(&mut self) -> Result<()> {
        match self.parents.pop() {
            None => Err(unmatched("endif")),
            Some(parent) => {
                self.current = parent;
                Ok(())
            }
        }
    }

    /// Checks that every conditional has been closed.
    pub fn finish(&self) -> Result<()> {
        match self.depth() {
            0 => Ok(()),
            n => Err(Error::new(
                Kind::Semantic,
                format!("{n} conditional directive(s) are not terminated"),
            )
            .with_note("every `if`, `ifdef` and `ifndef` must be closed with `endif`")),
        }
    }

    fn check_open(&self, directive: &str) -> Result<()> {
        if self.parents.is_empty() {
            return Err(unmatched(directive));
        }
        match self.current.state {
            BranchState::If | BranchState::ElseIf => Ok(()),
            BranchState::Else => Err(Error::new(
                Kind::Semantic,
                format!("unexpected `{directive}` after `else`"),
            )),
            BranchState::Unknown => Err(unmatched(directive)),
        }
    }
}

fn unmatched(directive: &str) -> Box<Error> {
    Error::new(Kind::Semantic, format!("unmatched `{directive}` directive"))
        .with_note("there is no open `if`, `ifdef` or `ifndef`")
}
