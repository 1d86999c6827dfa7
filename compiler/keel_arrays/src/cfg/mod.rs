//! Control-flow templates shared by the lowering operations.
//!
//! - [`counted_loop`]: `for i in 0..count { body(i) }` over a stack index slot
//! - [`trap_guard`]: branch to a non-returning failure block unless a
//!   condition holds

use keel_ir::{BinOp, ICmpPred, IrBuilder, ValueId};

/// Emit a counted loop and leave the builder positioned after it.
///
/// ```text
/// entry: store 0 -> %i ; br fill.test
/// fill.test: %c = icmp ne load(%i), count ; condbr %c fill.body fill.done
/// fill.body: body(load(%i)) ; store %i + 1 -> %i ; br fill.test
/// fill.done:
/// ```
///
/// The index slot is dead after `fill.done`.
pub fn counted_loop(
    b: &mut IrBuilder<'_>,
    count: ValueId,
    mut body: impl FnMut(&mut IrBuilder<'_>, ValueId),
) {
    let word = b.word();
    let slot = b.alloca(word.clone());
    let zero = b.const_word(0);
    b.store(zero, slot);

    let test = b.append_block("fill.test");
    let body_block = b.append_block("fill.body");
    let done = b.append_block("fill.done");
    b.br(test);

    b.position_at_end(test);
    let index = b.load(word.clone(), slot);
    let more = b.icmp(ICmpPred::Ne, index, count);
    b.cond_br(more, body_block, done);

    b.position_at_end(body_block);
    let index = b.load(word, slot);
    body(b, index);
    let one = b.const_word(1);
    let next = b.binary(BinOp::Add, index, one);
    b.store(next, slot);
    b.br(test);

    b.position_at_end(done);
    tracing::trace!(test = ?test, "emitted counted loop");
}

/// Continue in `ok_name` when `ok` holds; otherwise run `fail` in
/// `fail_name` and end that block with `unreachable`.
pub fn trap_guard(
    b: &mut IrBuilder<'_>,
    ok: ValueId,
    ok_name: &str,
    fail_name: &str,
    fail: impl FnOnce(&mut IrBuilder<'_>),
) {
    let ok_block = b.append_block(ok_name);
    let fail_block = b.append_block(fail_name);
    b.cond_br(ok, ok_block, fail_block);

    b.position_at_end(fail_block);
    fail(b);
    b.unreachable();

    b.position_at_end(ok_block);
}

#[cfg(test)]
mod tests;
