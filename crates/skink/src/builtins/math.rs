//! The `Math` namespace object.

use crate::{
    context::Context,
    error::RunResult,
    heap::HeapId,
    object::JsObject,
    resource::ResourceTracker,
    value::Value,
};

use super::{NativeFn, arg, define_method};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MathFn {
    Abs,
    Floor,
    Ceil,
    Round,
    Trunc,
    Sign,
    Sqrt,
    Cbrt,
    Pow,
    Min,
    Max,
    Random,
    Log,
    Log2,
    Log10,
    Exp,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Atan2,
    Hypot,
}

pub(crate) fn install<T: ResourceTracker>(cx: &mut Context<T>, global: HeapId) -> RunResult<()> {
    let object_proto = cx.realm_ref().object_proto;
    let math = cx
        .heap
        .alloc_object(JsObject::with_data(Some(object_proto), "Math", crate::object::ObjectData::Ordinary))?;

    let fns = [
        ("abs", MathFn::Abs, 1),
        ("floor", MathFn::Floor, 1),
        ("ceil", MathFn::Ceil, 1),
        ("round", MathFn::Round, 1),
        ("trunc", MathFn::Trunc, 1),
        ("sign", MathFn::Sign, 1),
        ("sqrt", MathFn::Sqrt, 1),
        ("cbrt", MathFn::Cbrt, 1),
        ("pow", MathFn::Pow, 2),
        ("min", MathFn::Min, 2),
        ("max", MathFn::Max, 2),
        ("random", MathFn::Random, 0),
        ("log", MathFn::Log, 1),
        ("log2", MathFn::Log2, 1),
        ("log10", MathFn::Log10, 1),
        ("exp", MathFn::Exp, 1),
        ("sin", MathFn::Sin, 1),
        ("cos", MathFn::Cos, 1),
        ("tan", MathFn::Tan, 1),
        ("asin", MathFn::Asin, 1),
        ("acos", MathFn::Acos, 1),
        ("atan", MathFn::Atan, 1),
        ("atan2", MathFn::Atan2, 2),
        ("hypot", MathFn::Hypot, 2),
    ];
    for (name, f, length) in fns {
        define_method(cx, math, name, NativeFn::Math(f), length)?;
    }

    let constants = [
        ("PI", std::f64::consts::PI),
        ("E", std::f64::consts::E),
        ("LN2", std::f64::consts::LN_2),
        ("LN10", std::f64::consts::LN_10),
        ("LOG2E", std::f64::consts::LOG2_E),
        ("LOG10E", std::f64::consts::LOG10_E),
        ("SQRT2", std::f64::consts::SQRT_2),
        ("SQRT1_2", std::f64::consts::FRAC_1_SQRT_2),
    ];
    for (name, value) in constants {
        cx.define_locked(math, name, Value::number(value));
    }

    cx.heap.object_mut(global).define_method("Math", Value::Object(math));
    Ok(())
}

pub(crate) fn dispatch<T: ResourceTracker>(
    cx: &mut Context<T>,
    f: MathFn,
    _this: &Value,
    args: &[Value],
) -> RunResult<Value> {
    let result = match f {
        MathFn::Abs => cx.to_number_value(&arg(args, 0))?.abs(),
        MathFn::Floor => cx.to_number_value(&arg(args, 0))?.floor(),
        MathFn::Ceil => cx.to_number_value(&arg(args, 0))?.ceil(),
        MathFn::Round => {
            // ECMA rounds half-up, where Rust's round() rounds half away
            // from zero.
            let n = cx.to_number_value(&arg(args, 0))?;
            (n + 0.5).floor()
        }
        MathFn::Trunc => cx.to_number_value(&arg(args, 0))?.trunc(),
        MathFn::Sign => {
            let n = cx.to_number_value(&arg(args, 0))?;
            if n.is_nan() || n == 0.0 { n } else { n.signum() }
        }
        MathFn::Sqrt => cx.to_number_value(&arg(args, 0))?.sqrt(),
        MathFn::Cbrt => cx.to_number_value(&arg(args, 0))?.cbrt(),
        MathFn::Pow => {
            let base = cx.to_number_value(&arg(args, 0))?;
            let exp = cx.to_number_value(&arg(args, 1))?;
            base.powf(exp)
        }
        MathFn::Min => {
            let mut best = f64::INFINITY;
            for value in args {
                let n = cx.to_number_value(value)?;
                if n.is_nan() {
                    return Ok(Value::number(f64::NAN));
                }
                best = best.min(n);
            }
            best
        }
        MathFn::Max => {
            let mut best = f64::NEG_INFINITY;
            for value in args {
                let n = cx.to_number_value(value)?;
                if n.is_nan() {
                    return Ok(Value::number(f64::NAN));
                }
                best = best.max(n);
            }
            best
        }
        MathFn::Random => pseudo_random(),
        MathFn::Log => cx.to_number_value(&arg(args, 0))?.ln(),
        MathFn::Log2 => cx.to_number_value(&arg(args, 0))?.log2(),
        MathFn::Log10 => cx.to_number_value(&arg(args, 0))?.log10(),
        MathFn::Exp => cx.to_number_value(&arg(args, 0))?.exp(),
        MathFn::Sin => cx.to_number_value(&arg(args, 0))?.sin(),
        MathFn::Cos => cx.to_number_value(&arg(args, 0))?.cos(),
        MathFn::Tan => cx.to_number_value(&arg(args, 0))?.tan(),
        MathFn::Asin => cx.to_number_value(&arg(args, 0))?.asin(),
        MathFn::Acos => cx.to_number_value(&arg(args, 0))?.acos(),
        MathFn::Atan => cx.to_number_value(&arg(args, 0))?.atan(),
        MathFn::Atan2 => {
            let y = cx.to_number_value(&arg(args, 0))?;
            let x = cx.to_number_value(&arg(args, 1))?;
            y.atan2(x)
        }
        MathFn::Hypot => {
            let mut sum = 0.0f64;
            for value in args {
                let n = cx.to_number_value(value)?;
                sum += n * n;
            }
            sum.sqrt()
        }
    };
    Ok(Value::number(result))
}

/// `Math.random` without an OS entropy dependency: a SplitMix64 stream
/// seeded from the system clock.
fn pseudo_random() -> f64 {
    use std::cell::Cell;
    thread_local! {
        static STATE: Cell<u64> = Cell::new(0);
    }
    STATE.with(|state| {
        let mut seed = state.get();
        if seed == 0 {
            seed = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map_or(0x9E37_79B9_7F4A_7C15, |d| d.as_nanos() as u64 | 1);
        }
        seed = seed.wrapping_add(0x9E37_79B9_7F4A_7C15);
        state.set(seed);
        let mut z = seed;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^= z >> 31;
        (z >> 11) as f64 / (1u64 << 53) as f64
    })
}
