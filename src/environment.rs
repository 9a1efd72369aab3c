//! Scope frames, stored in an arena and addressed by [`EnvId`].
//!
//! A closure holds the id of the frame it captured, not a counted reference,
//! so a frame that stores a function closing over that same frame is not an
//! ownership cycle.  A frame is freed as soon as its scope exits unless a
//! function or class captured it.  Captured frames stay until
//! [`Environments::collect`] finds them unreachable from the roots.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::error::{LoxError, Result};
use crate::token::Token;
use crate::value::Value;

/// Handle to a frame in an [`Environments`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnvId(usize);

/// One lexical scope at runtime: a name → value table plus a parent link.
#[derive(Debug, Default)]
struct Frame {
    values: HashMap<String, Value>,
    enclosing: Option<EnvId>,
    /// Set once a closure refers to this frame or one nested inside it.
    captured: bool,
}

#[derive(Debug, Default)]
pub struct Environments {
    frames: Vec<Option<Frame>>,
    free: Vec<usize>,
}

impl Environments {
    pub fn new() -> Self {
        Self::default()
    }

    /// New empty frame whose parent is `enclosing`.
    pub fn alloc(&mut self, enclosing: Option<EnvId>) -> EnvId {
        let frame = Frame {
            values: HashMap::new(),
            enclosing,
            captured: false,
        };

        match self.free.pop() {
            Some(index) => {
                self.frames[index] = Some(frame);
                EnvId(index)
            }
            None => {
                self.frames.push(Some(frame));
                EnvId(self.frames.len() - 1)
            }
        }
    }

    /// Number of frames currently allocated.
    pub fn live(&self) -> usize {
        self.frames.len() - self.free.len()
    }

    fn frame(&self, env: EnvId) -> Option<&Frame> {
        self.frames.get(env.0).and_then(Option::as_ref)
    }

    fn frame_mut(&mut self, env: EnvId) -> Option<&mut Frame> {
        self.frames.get_mut(env.0).and_then(Option::as_mut)
    }

    /// Bind `name` in `env`, replacing any previous binding.
    pub fn define(&mut self, env: EnvId, name: &str, value: Value) {
        if let Some(frame) = self.frame_mut(env) {
            frame.values.insert(name.to_string(), value);
        }
    }

    /// Binding held directly by `env`, without looking outward.
    pub fn get_local(&self, env: EnvId, name: &str) -> Option<Value> {
        self.frame(env)?.values.get(name).cloned()
    }

    /// Name lookup through the whole chain starting at `env`.
    pub fn get(&self, env: EnvId, name: &Token) -> Result<Value> {
        let holder = self.holder(env, &name.lexeme).ok_or_else(|| undefined(name))?;
        self.get_local(holder, &name.lexeme).ok_or_else(|| undefined(name))
    }

    pub fn assign(&mut self, env: EnvId, name: &Token, value: Value) -> Result<()> {
        let holder = self.holder(env, &name.lexeme).ok_or_else(|| undefined(name))?;
        self.assign_local(holder, name, value)
    }

    /// Innermost frame from `env` outward that binds `name`.
    fn holder(&self, env: EnvId, name: &str) -> Option<EnvId> {
        let mut current = Some(env);

        while let Some(id) = current {
            let frame = self.frame(id)?;
            if frame.values.contains_key(name) {
                return Some(id);
            }
            current = frame.enclosing;
        }

        None
    }

    /// The frame `distance` parent links above `env`.
    pub fn ancestor(&self, env: EnvId, distance: usize) -> Option<EnvId> {
        let mut id = env;

        for _ in 0..distance {
            id = self.frame(id)?.enclosing?;
        }

        self.frame(id).map(|_| id)
    }

    /// Read a resolved binding directly from the frame at `distance`.
    pub fn get_at(&self, env: EnvId, distance: usize, name: &Token) -> Result<Value> {
        let frame = self.ancestor(env, distance).ok_or_else(|| undefined(name))?;
        self.get_local(frame, &name.lexeme).ok_or_else(|| undefined(name))
    }

    /// Overwrite a resolved binding in the frame at `distance`.
    pub fn assign_at(&mut self, env: EnvId, distance: usize, name: &Token, value: Value) -> Result<()> {
        let frame = self.ancestor(env, distance).ok_or_else(|| undefined(name))?;
        self.assign_local(frame, name, value)
    }

    fn assign_local(&mut self, env: EnvId, name: &Token, value: Value) -> Result<()> {
        match self
            .frame_mut(env)
            .and_then(|frame| frame.values.get_mut(&name.lexeme))
        {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(undefined(name)),
        }
    }

    /// Record that a closure refers to `env`.  The frame and every frame
    /// around it then outlive their scopes.
    pub fn capture(&mut self, env: EnvId) {
        let mut current = Some(env);

        while let Some(id) = current {
            let Some(frame) = self.frame_mut(id) else {
                break;
            };
            if frame.captured {
                break;
            }
            frame.captured = true;
            current = frame.enclosing;
        }
    }

    /// Free `env` at the end of its scope unless it was captured.
    pub fn release(&mut self, env: EnvId) {
        if self.frame(env).is_some_and(|frame| !frame.captured) {
            self.free_slot(env.0);
        }
    }

    fn free_slot(&mut self, index: usize) {
        let freed = self.frames.get_mut(index).and_then(Option::take);
        if freed.is_some() {
            self.free.push(index);
        }
    }

    /// Mark every frame reachable from `roots`, through parent links and
    /// through the functions, classes and instances stored in frames, then
    /// free the rest.  Returns how many frames were freed.
    ///
    /// Values held outside the arena are not traced, so callers only collect
    /// when no evaluation is in progress.
    pub fn collect(&mut self, roots: &[EnvId]) -> usize {
        let mut marked = vec![false; self.frames.len()];
        let mut frames: Vec<EnvId> = roots.to_vec();
        let mut values: Vec<Value> = Vec::new();
        let mut seen = HashSet::new();

        loop {
            if let Some(id) = frames.pop() {
                let Some(frame) = self.frame(id) else {
                    continue;
                };
                if marked[id.0] {
                    continue;
                }
                marked[id.0] = true;
                frames.extend(frame.enclosing);
                values.extend(frame.values.values().cloned());
            } else if let Some(value) = values.pop() {
                if value.object_id().is_some_and(|object| seen.insert(object)) {
                    value.references(&mut frames, &mut values);
                }
            } else {
                break;
            }
        }

        let mut freed = 0;
        for (index, reachable) in marked.into_iter().enumerate() {
            if !reachable && self.frames[index].is_some() {
                self.free_slot(index);
                freed += 1;
            }
        }

        debug!("Collected {} frame(s), {} live", freed, self.live());
        freed
    }
}

fn undefined(name: &Token) -> LoxError {
    LoxError::runtime(name, format!("Undefined variable '{}'.", name.lexeme))
}
