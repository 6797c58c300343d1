// Include generated modules from build.rs (in OUT_DIR)
include!(concat!(env!("OUT_DIR"), "/mod.rs"));

pub fn accumulate_orig(n: i64, init: i64) -> i64 {
    let mut acc = init;
    for i in 0..n {
        acc += i;
    }
    acc
}

pub fn silu_orig(x: f64) -> f64 {
    x / (1.0 + (-x).exp())
}
