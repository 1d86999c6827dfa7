use pretty_assertions::assert_eq;

use super::*;

#[test]
fn test_error_code_display() {
    assert_eq!(ErrorCode::E5001.to_string(), "E5001");
    assert_eq!(ErrorCode::E9001.as_str(), "E9001");
}

#[test]
fn test_codegen_error_codes() {
    assert!(ErrorCode::E5001.is_codegen_error());
    assert!(ErrorCode::E5007.is_codegen_error());
    assert!(!ErrorCode::E5001.is_internal_error());
    assert!(ErrorCode::E9001.is_internal_error());
    assert!(!ErrorCode::E9002.is_codegen_error());
}

#[test]
fn test_from_str() {
    assert_eq!("e5003".parse::<ErrorCode>(), Ok(ErrorCode::E5003));
    assert_eq!("E5003".parse::<ErrorCode>(), Ok(ErrorCode::E5003));
    assert_eq!("E0001".parse::<ErrorCode>(), Err(()));
}

#[test]
fn test_all_codes_parse_back() {
    for code in ErrorCode::ALL {
        assert_eq!(code.as_str().parse::<ErrorCode>(), Ok(*code));
        assert!(!code.description().is_empty());
    }
}
