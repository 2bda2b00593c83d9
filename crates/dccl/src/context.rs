//! Traversal context: the ancestor stack field codecs consult to resolve
//! predicate field references and sibling/ancestor lookups.
//!
//! The context is not a process-wide global. It is built fresh, as a local
//! variable, at the start of each top-level `encode`/`decode` call and
//! threaded by `&mut` reference through the recursive descent into nested
//! messages. Frames are pushed and popped through an RAII guard, so a panic
//! or early `?` return during a nested call can never leave a stale frame
//! behind for a sibling call to observe.

use smartstring::{LazyCompact, SmartString};

use crate::predicate::FieldPath;
use crate::value::{MessageValue, WireValue};

type DcclString = SmartString<LazyCompact>;

/// Which portion of a message is currently being traversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Part {
    Head,
    Body,
}

struct Frame {
    message: MessageValue,
    #[allow(dead_code)]
    part: Part,
    group: DcclString,
}

/// Owns the ancestor stack for one top-level encode or decode call.
#[derive(Default)]
pub struct Context {
    stack: Vec<Frame>,
}

impl Context {
    /// An empty context, ready for a top-level message traversal.
    #[must_use]
    pub fn new() -> Self {
        Self { stack: Vec::new() }
    }

    /// Depth of message nesting currently on the stack.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Pushes a new frame and returns a guard that pops it on drop.
    ///
    /// `group` is the field-codec group in effect for fields of this
    /// message: an explicit `codec_group` override on the field that
    /// introduced it, or the parent's group if none was given.
    pub fn push<'ctx>(
        &'ctx mut self,
        message: MessageValue,
        part: Part,
        group: DcclString,
    ) -> ContextGuard<'ctx> {
        self.stack.push(Frame { message, part, group });
        ContextGuard { ctx: self }
    }

    /// The message currently being traversed (top of stack), if any.
    #[must_use]
    pub fn current_message(&self) -> Option<&MessageValue> {
        self.stack.last().map(|f| &f.message)
    }

    /// Mutable access to the message currently being built (decode path).
    pub fn current_message_mut(&mut self) -> Option<&mut MessageValue> {
        self.stack.last_mut().map(|f| &mut f.message)
    }

    /// The field-codec group in effect for the message currently being traversed.
    #[must_use]
    pub fn current_group(&self) -> &str {
        self.stack.last().map_or("default", |f| f.group.as_str())
    }

    /// Resolves a predicate field path against the ancestor stack.
    #[must_use]
    pub fn resolve_path(&self, path: &FieldPath) -> Option<WireValue> {
        if path.ups >= self.stack.len() {
            return None;
        }
        let base_idx = self.stack.len() - 1 - path.ups;
        let mut message = &self.stack[base_idx].message;
        let (last, init) = path.segments.split_last()?;
        for segment in init {
            let value = message.get_scalar(segment)?;
            message = value.as_message()?;
        }
        message.get_scalar(last).cloned()
    }
}

/// RAII guard returned by [`Context::push`]; pops its frame when dropped.
pub struct ContextGuard<'ctx> {
    ctx: &'ctx mut Context,
}

impl<'ctx> ContextGuard<'ctx> {
    /// Reborrows the underlying context for use while the frame is live.
    pub fn context(&mut self) -> &mut Context {
        self.ctx
    }
}

impl<'ctx> Drop for ContextGuard<'ctx> {
    fn drop(&mut self) {
        self.ctx.stack.pop();
    }
}
