//! Bounds-check emission.

use keel_ir::{ICmpPred, RuntimeFn, SourceLoc, ValueId};

use crate::cfg::trap_guard;
use crate::context::LowerCx;
use crate::repr::ArrayShape;
use crate::value::RuntimeValue;

impl LowerCx<'_> {
    /// Trap unless `index < len(array)`.
    ///
    /// Skipped when checks are disabled, when `index` is `None` (known in
    /// bounds), and for pointers, which carry no length.
    pub fn index_bounds_check(
        &mut self,
        array: &RuntimeValue,
        index: Option<ValueId>,
        loc: SourceLoc,
    ) {
        if !self.config.bounds_checks {
            return;
        }
        let Some(index) = index else {
            return;
        };
        if !self.shape(array.ty).is_some_and(ArrayShape::is_array) {
            return;
        }
        let len = self.array_len(array);
        let in_bounds = self.b.icmp(ICmpPred::Ult, index, len);
        tracing::trace!(line = loc.line, "bounds check");
        self.guard_or_bounds_fail(in_bounds, "bounds.ok", "bounds.fail", loc);
    }

    /// Continue in `ok_name` when `ok` holds; otherwise report a bounds
    /// failure at `loc`.
    pub(crate) fn guard_or_bounds_fail(
        &mut self,
        ok: ValueId,
        ok_name: &str,
        fail_name: &str,
        loc: SourceLoc,
    ) {
        let file = self.file_name_slice();
        let line = self
            .b
            .const_i32(i32::try_from(loc.line).unwrap_or(i32::MAX));
        trap_guard(&mut self.b, ok, ok_name, fail_name, |b| {
            b.call_runtime(RuntimeFn::BoundsFail, vec![file, line]);
        });
    }
}
