use super::mask_secret as mask_secret_impl;

#[test]
fn mask_secret() {
    assert_eq!(mask_secret_impl(""), "(not set)");
    assert_eq!(mask_secret_impl("   "), "(not set)");
    assert_eq!(mask_secret_impl("sk-or-v1-abcdef"), "sk-o****");
    assert_eq!(mask_secret_impl("ab"), "ab****");
}
