//! Lowering-level scenarios: instruction selection and whole-program
//! tree-shaking, checked against the linked byte buffer and surviving
//! function labels rather than an executed result.

use tyl_backend::ast::*;
use tyl_backend::OptLevel;

use super::*;

#[test]
fn multiplying_by_a_power_of_two_lowers_to_a_shift_not_a_multiply() {
    // fn main() -> i64 { var x = 5; return x * 8; }
    let body = block(vec![
        var_decl("x", int_lit(5)),
        return_stmt(Some(binary(BinaryOp::Mul, ident("x"), int_lit(8)))),
    ]);
    let program = program_with_main(body);
    let (module, _linked) = build(program, OptLevel::O0);

    let main = module.functions.iter().find(|f| f.label == "main").unwrap();
    let code = main.code.code();

    // shl rax, imm8 encodes as [REX.W, 0xC1, modrm(ext=4), imm8].
    let has_shl = code.windows(2).any(|w| w == [0xC1, 0xE0]);
    assert!(has_shl, "expected a shl rax, imm8 in: {code:02x?}");

    // The two-byte imul form (0x0F 0xAF) must not appear anywhere.
    let has_imul = code.windows(2).any(|w| w == [0x0F, 0xAF]);
    assert!(!has_imul, "strength reduction should have replaced imul: {code:02x?}");
}

#[test]
fn printing_an_integer_literal_round_trips_through_itoa_and_print_int() {
    // fn main() -> i64 { print(42); return 0; }
    let body = block(vec![expr_stmt(builtin("print", vec![int_lit(42)])), return_stmt(Some(int_lit(0)))]);
    let program = program_with_main(body);
    let (module, linked) = build(program, OptLevel::O0);

    let main = module.functions.iter().find(|f| f.label == "main").unwrap();
    let code = main.code.code();

    // `print(42)` loads the literal into rcx then calls the shared
    // `$rt_print_int` snippet, which formats it through `$rt_itoa`.
    let has_call = code.windows(1).any(|w| w == [0xE8]);
    assert!(has_call, "expected a call rel32 to the print_int snippet in: {code:02x?}");

    let runtime = module.functions.iter().find(|f| f.label == "$runtime").unwrap();
    assert!(runtime.code.labels().contains_key("$rt_itoa"));
    assert!(runtime.code.labels().contains_key("$rt_print_int"));

    // Linking must resolve `main`'s call into `$runtime` and `$rt_print_int`'s
    // internal call into `$rt_itoa`, both across function-buffer boundaries.
    assert!(linked.code.len() > 0);
}

#[test]
fn ok_wraps_its_payload_in_a_tagged_scalar_not_a_heap_allocation() {
    // fn main() -> i64 { return unwrap(ok(21)); }
    let body = block(vec![return_stmt(Some(builtin("unwrap", vec![builtin("ok", vec![int_lit(21)])])))]);
    let program = program_with_main(body);
    let (module, _linked) = build(program, OptLevel::O0);

    let main = module.functions.iter().find(|f| f.label == "main").unwrap();
    let code = main.code.code();

    // `ok(21)` shifts left by 1 then ORs in the tag bit; no call to a heap
    // allocator should appear for this builtin at all.
    let has_shl_by_one = code.windows(2).any(|w| w == [0xC1, 0xE0]);
    assert!(has_shl_by_one, "expected shl rax, 1 tagging the payload: {code:02x?}");
    let has_call = code.windows(1).any(|w| w == [0xE8]);
    assert!(!has_call, "ok/unwrap must not allocate on the heap: {code:02x?}");
}

#[test]
fn is_err_reads_the_tag_bit_directly() {
    // fn main() -> i64 { return is_err(err(1)); }
    let body = block(vec![return_stmt(Some(builtin("is_err", vec![builtin("err", vec![int_lit(1)])])))]);
    let program = program_with_main(body);
    let (module, _linked) = build(program, OptLevel::O0);
    let main = module.functions.iter().find(|f| f.label == "main").unwrap();
    assert!(!main.code.is_empty());
}

#[test]
fn printing_a_float_pulls_in_ftoa_and_print_float_not_just_the_integer_path() {
    // fn main() -> i64 { print(3.5); return 0; }
    let body = block(vec![expr_stmt(builtin("print", vec![float_lit(3.5)])), return_stmt(Some(int_lit(0)))]);
    let program = program_with_main(body);
    let (module, _linked) = build(program, OptLevel::O0);

    assert!(module.runtime_usage.ftoa);
    assert!(module.runtime_usage.print_float);

    let runtime = module.functions.iter().find(|f| f.label == "$runtime").unwrap();
    assert!(runtime.code.labels().contains_key("$rt_ftoa"));
    assert!(runtime.code.labels().contains_key("$rt_print_float"));
    // print_float calls into itoa for the integer part even though this
    // program never calls print_int directly.
    assert!(runtime.code.labels().contains_key("$rt_itoa"));
}

#[test]
fn address_of_a_register_resident_local_spills_it_first() {
    // fn main() -> i64 { var x = 5; var p = &x; return x; }
    let body = block(vec![
        var_decl("x", int_lit(5)),
        var_decl("p", address_of(ident("x"))),
        return_stmt(Some(ident("x"))),
    ]);
    let program = program_with_main(body);
    let (module, _linked) = build(program, OptLevel::O0);

    let main = module.functions.iter().find(|f| f.label == "main").unwrap();
    let code = main.code.code();

    // `lea reg, [rbp+disp32]` encodes as [REX, 0x8D, modrm(mod=10)].
    let has_lea = code.windows(2).any(|w| w[0] == 0x8D);
    assert!(has_lea, "expected a lea computing x's stack address: {code:02x?}");
}

#[test]
fn functions_never_reachable_from_main_are_dropped_from_the_linked_module() {
    // fn used() -> i64 { return 1; }
    // fn unused1() -> i64 { return 2; }
    // fn unused2() -> i64 { return 3; }
    // fn main() -> i64 { return used(); }
    let used = function("used", vec![], Type::I64, block(vec![return_stmt(Some(int_lit(1)))]));
    let unused1 = function("unused1", vec![], Type::I64, block(vec![return_stmt(Some(int_lit(2)))]));
    let unused2 = function("unused2", vec![], Type::I64, block(vec![return_stmt(Some(int_lit(3)))]));
    let main = function(
        "main",
        vec![],
        Type::I64,
        block(vec![return_stmt(Some(call_direct("used", vec![])))]),
    );
    let program = Program { functions: vec![used, unused1, unused2, main], ..Default::default() };

    let (module, _linked) = build(program, OptLevel::O1);

    let labels: Vec<&str> = module.functions.iter().map(|f| f.label.as_str()).collect();
    assert!(labels.contains(&"_start"));
    assert!(labels.contains(&"main"));
    assert!(labels.contains(&"used"));
    assert!(!labels.contains(&"unused1"), "unused1 should have been tree-shaken: {labels:?}");
    assert!(!labels.contains(&"unused2"), "unused2 should have been tree-shaken: {labels:?}");
}
