use pretty_assertions::assert_eq;

use super::*;

#[test]
fn inverse_predicates() {
    let all = [
        ICmpPred::Eq,
        ICmpPred::Ne,
        ICmpPred::Ult,
        ICmpPred::Ule,
        ICmpPred::Ugt,
        ICmpPred::Uge,
        ICmpPred::Slt,
        ICmpPred::Sle,
        ICmpPred::Sgt,
        ICmpPred::Sge,
    ];
    for pred in all {
        assert_eq!(pred.inverse().inverse(), pred);
        assert_ne!(pred.inverse(), pred);
    }
    assert_eq!(ICmpPred::Ult.inverse(), ICmpPred::Uge);
}

#[test]
fn successors() {
    let a = BlockId::new(1);
    let b = BlockId::new(2);
    assert_eq!(Terminator::Br(a).successors().as_slice(), &[a]);
    let cond = Terminator::CondBr {
        cond: ValueId::new(0),
        then_block: a,
        else_block: b,
    };
    assert_eq!(cond.successors().as_slice(), &[a, b]);
    assert!(Terminator::Unreachable.successors().is_empty());
}

#[test]
fn defined_values() {
    let dst = ValueId::new(3);
    let load = Instr::Load {
        dst,
        ty: MemTy::I32,
        ptr: ValueId::new(0),
    };
    assert_eq!(load.defined_value(), Some(dst));
    assert!(!load.writes_memory());
    let store = Instr::Store {
        value: ValueId::new(1),
        ptr: ValueId::new(0),
    };
    assert_eq!(store.defined_value(), None);
    assert!(store.writes_memory());
}
