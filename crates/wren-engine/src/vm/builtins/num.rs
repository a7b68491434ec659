//! `Num`

use super::{ok, primitive, static_primitive, validate_num, validate_string};
use crate::vm::interpreter::PrimitiveResult;
use crate::vm::object::{Obj, ObjRange};
use crate::vm::value::Value;
use crate::vm::Vm;

/// Format a number the way `toString` shows it: up to 14 significant
/// digits, switching to exponent notation for very large or small values.
pub(crate) fn format_num(n: f64) -> String {
    if n.is_nan() {
        return "nan".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "infinity" } else { "-infinity" }.to_string();
    }
    if n == 0.0 {
        return if n.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    // Rounding to 14 digits first decides which notation to use.
    let scientific = format!("{:.13e}", n);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((mantissa, exponent)) => (mantissa, exponent.parse::<i32>().unwrap_or(0)),
        None => (scientific.as_str(), 0),
    };

    if !(-4..14).contains(&exponent) {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_fraction(mantissa), sign, exponent.abs())
    } else {
        let precision = (13 - exponent) as usize;
        trim_fraction(&format!("{:.*}", precision, n)).to_string()
    }
}

/// Drop trailing zeros after the decimal point, and the point itself
fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

/// Parse `Num.fromString` input. `Ok(None)` when the text is not a number.
pub(crate) fn parse_num(text: &str) -> Result<Option<f64>, &'static str> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }

    let (negative, unsigned) = match text.as_bytes()[0] {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };
    if let Some(hex) = unsigned.strip_prefix("0x").or_else(|| unsigned.strip_prefix("0X")) {
        return Ok(u64::from_str_radix(hex, 16)
            .ok()
            .map(|n| if negative { -(n as f64) } else { n as f64 }));
    }

    match text.parse::<f64>() {
        Ok(n) if n.is_infinite() && !text.to_ascii_lowercase().contains("inf") => Err("Number literal is too large."),
        Ok(n) => Ok(Some(n)),
        Err(_) => Ok(None),
    }
}

pub(super) fn bind(vm: &mut Vm) {
    let num = vm.core.num;

    static_primitive(vm, num, "fromString(_)", num_from_string);
    static_primitive(vm, num, "infinity", |_, _| ok(f64::INFINITY));
    static_primitive(vm, num, "nan", |_, _| ok(f64::NAN));
    static_primitive(vm, num, "pi", |_, _| ok(std::f64::consts::PI));
    static_primitive(vm, num, "tau", |_, _| ok(std::f64::consts::TAU));
    static_primitive(vm, num, "largest", |_, _| ok(f64::MAX));
    static_primitive(vm, num, "smallest", |_, _| ok(f64::MIN_POSITIVE));
    static_primitive(vm, num, "maxSafeInteger", |_, _| ok(9_007_199_254_740_991.0));
    static_primitive(vm, num, "minSafeInteger", |_, _| ok(-9_007_199_254_740_991.0));

    primitive(vm, num, "-(_)", num_minus);
    primitive(vm, num, "+(_)", num_plus);
    primitive(vm, num, "*(_)", num_multiply);
    primitive(vm, num, "/(_)", num_divide);
    primitive(vm, num, "%(_)", num_mod);
    primitive(vm, num, "<(_)", num_lt);
    primitive(vm, num, ">(_)", num_gt);
    primitive(vm, num, "<=(_)", num_lte);
    primitive(vm, num, ">=(_)", num_gte);
    primitive(vm, num, "&(_)", num_bitwise_and);
    primitive(vm, num, "|(_)", num_bitwise_or);
    primitive(vm, num, "^(_)", num_bitwise_xor);
    primitive(vm, num, "<<(_)", num_shift_left);
    primitive(vm, num, ">>(_)", num_shift_right);
    primitive(vm, num, "..(_)", num_range_inclusive);
    primitive(vm, num, "...(_)", num_range_exclusive);
    primitive(vm, num, "==(_)", num_eq);
    primitive(vm, num, "!=(_)", num_neq);
    primitive(vm, num, "~", num_bitwise_not);
    primitive(vm, num, "-", |_, args| ok(-args[0].as_num()));

    primitive(vm, num, "abs", |_, args| ok(args[0].as_num().abs()));
    primitive(vm, num, "acos", |_, args| ok(args[0].as_num().acos()));
    primitive(vm, num, "asin", |_, args| ok(args[0].as_num().asin()));
    primitive(vm, num, "atan", |_, args| ok(args[0].as_num().atan()));
    primitive(vm, num, "cbrt", |_, args| ok(args[0].as_num().cbrt()));
    primitive(vm, num, "ceil", |_, args| ok(args[0].as_num().ceil()));
    primitive(vm, num, "cos", |_, args| ok(args[0].as_num().cos()));
    primitive(vm, num, "floor", |_, args| ok(args[0].as_num().floor()));
    primitive(vm, num, "round", |_, args| ok(args[0].as_num().round()));
    primitive(vm, num, "sin", |_, args| ok(args[0].as_num().sin()));
    primitive(vm, num, "sqrt", |_, args| ok(args[0].as_num().sqrt()));
    primitive(vm, num, "tan", |_, args| ok(args[0].as_num().tan()));
    primitive(vm, num, "log", |_, args| ok(args[0].as_num().ln()));
    primitive(vm, num, "log2", |_, args| ok(args[0].as_num().log2()));
    primitive(vm, num, "exp", |_, args| ok(args[0].as_num().exp()));
    primitive(vm, num, "fraction", |_, args| ok(args[0].as_num().fract()));
    primitive(vm, num, "truncate", |_, args| ok(args[0].as_num().trunc()));
    primitive(vm, num, "sign", num_sign);
    primitive(vm, num, "isInteger", num_is_integer);
    primitive(vm, num, "isNan", |_, args| ok(args[0].as_num().is_nan()));
    primitive(vm, num, "isInfinity", |_, args| ok(args[0].as_num().is_infinite()));
    primitive(vm, num, "toString", num_to_string);

    primitive(vm, num, "atan(_)", num_atan2);
    primitive(vm, num, "pow(_)", num_pow);
    primitive(vm, num, "min(_)", num_min);
    primitive(vm, num, "max(_)", num_max);
    primitive(vm, num, "clamp(_,_)", num_clamp);
}

fn num_from_string(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    let string = check!(validate_string(vm, args[1], "Argument"));
    let text = vm.heap.string(string).to_str_lossy().into_owned();
    match parse_num(&text) {
        Ok(Some(n)) => ok(n),
        Ok(None) => ok(Value::NULL),
        Err(message) => vm.primitive_error(message),
    }
}

/// Both operands of a binary operator
fn operands(vm: &mut Vm, args: &[Value]) -> Result<(f64, f64), PrimitiveResult> {
    let right = validate_num(vm, args[1], "Right operand")?;
    Ok((args[0].as_num(), right))
}

macro_rules! binary_ops {
    ($($name:ident => |$a:ident, $b:ident| $body:expr;)*) => {
        $(
            fn $name(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
                let ($a, $b) = check!(operands(vm, args));
                ok($body)
            }
        )*
    };
}

binary_ops! {
    num_minus => |a, b| a - b;
    num_plus => |a, b| a + b;
    num_multiply => |a, b| a * b;
    num_divide => |a, b| a / b;
    num_mod => |a, b| a % b;
    num_lt => |a, b| a < b;
    num_gt => |a, b| a > b;
    num_lte => |a, b| a <= b;
    num_gte => |a, b| a >= b;
    num_bitwise_and => |a, b| (to_u32(a) & to_u32(b)) as f64;
    num_bitwise_or => |a, b| (to_u32(a) | to_u32(b)) as f64;
    num_bitwise_xor => |a, b| (to_u32(a) ^ to_u32(b)) as f64;
    num_shift_left => |a, b| to_u32(a).wrapping_shl(to_u32(b)) as f64;
    num_shift_right => |a, b| to_u32(a).wrapping_shr(to_u32(b)) as f64;
}

/// Bitwise operators work on the low 32 bits of the integer part
#[inline]
fn to_u32(n: f64) -> u32 {
    n as i64 as u32
}

fn num_bitwise_not(_vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    ok(!to_u32(args[0].as_num()) as f64)
}

fn num_eq(_vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    ok(args[1].try_num() == Some(args[0].as_num()))
}

fn num_neq(_vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    ok(args[1].try_num() != Some(args[0].as_num()))
}

fn new_range(vm: &mut Vm, args: &[Value], is_inclusive: bool) -> PrimitiveResult {
    let to = check!(validate_num(vm, args[1], "Right hand side of range"));
    let range = vm.allocate(
        None,
        Obj::Range(ObjRange {
            from: args[0].as_num(),
            to,
            is_inclusive,
        }),
    );
    ok(range)
}

fn num_range_inclusive(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    new_range(vm, args, true)
}

fn num_range_exclusive(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    new_range(vm, args, false)
}

fn num_sign(_vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    let n = args[0].as_num();
    let sign = if n > 0.0 {
        1.0
    } else if n < 0.0 {
        -1.0
    } else {
        0.0
    };
    ok(sign)
}

fn num_is_integer(_vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    let n = args[0].as_num();
    ok(n.is_finite() && n.trunc() == n)
}

fn num_to_string(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    let text = format_num(args[0].as_num());
    ok(vm.string_value(&text))
}

fn num_atan2(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    let x = check!(validate_num(vm, args[1], "x value"));
    ok(args[0].as_num().atan2(x))
}

fn num_pow(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    let power = check!(validate_num(vm, args[1], "Power value"));
    ok(args[0].as_num().powf(power))
}

fn num_min(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    let other = check!(validate_num(vm, args[1], "Other value"));
    let n = args[0].as_num();
    ok(if n <= other { n } else { other })
}

fn num_max(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    let other = check!(validate_num(vm, args[1], "Other value"));
    let n = args[0].as_num();
    ok(if n > other { n } else { other })
}

fn num_clamp(vm: &mut Vm, args: &[Value]) -> PrimitiveResult {
    let min = check!(validate_num(vm, args[1], "Min value"));
    let max = check!(validate_num(vm, args[2], "Max value"));
    let n = args[0].as_num();
    ok(if n < min {
        min
    } else if n > max {
        max
    } else {
        n
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_integers_and_fractions() {
        assert_eq!(format_num(0.0), "0");
        assert_eq!(format_num(-0.0), "-0");
        assert_eq!(format_num(42.0), "42");
        assert_eq!(format_num(-7.0), "-7");
        assert_eq!(format_num(3.5), "3.5");
        assert_eq!(format_num(0.1 + 0.2), "0.3");
        assert_eq!(format_num(1.0 / 3.0), "0.33333333333333");
    }

    #[test]
    fn test_format_exponent_notation() {
        assert_eq!(format_num(1e20), "1e+20");
        assert_eq!(format_num(123456789012345678.0), "1.2345678901235e+17");
        assert_eq!(format_num(0.00001), "1e-05");
        assert_eq!(format_num(0.0001), "0.0001");
        assert_eq!(format_num(12345678901234.0), "12345678901234");
        assert_eq!(format_num(100000000000000.0), "1e+14");
    }

    #[test]
    fn test_format_special_values() {
        assert_eq!(format_num(f64::NAN), "nan");
        assert_eq!(format_num(f64::INFINITY), "infinity");
        assert_eq!(format_num(f64::NEG_INFINITY), "-infinity");
    }

    #[test]
    fn test_parse_num() {
        assert_eq!(parse_num("12"), Ok(Some(12.0)));
        assert_eq!(parse_num("  -3.5 "), Ok(Some(-3.5)));
        assert_eq!(parse_num("1e3"), Ok(Some(1000.0)));
        assert_eq!(parse_num("0xff"), Ok(Some(255.0)));
        assert_eq!(parse_num("-0x10"), Ok(Some(-16.0)));
        assert_eq!(parse_num(""), Ok(None));
        assert_eq!(parse_num("12abc"), Ok(None));
        assert_eq!(parse_num("1e400"), Err("Number literal is too large."));
    }

    #[test]
    fn test_bitwise_truncates_to_u32() {
        assert_eq!(to_u32(5.7), 5);
        assert_eq!(to_u32(-1.0), u32::MAX);
        assert_eq!(to_u32(4294967296.0), 0);
    }
}
