//! Erlang C queueing formulas for M/M/c contact queues.

/// Erlang B blocking probability via the recursion
/// `B(0) = 1, B(k) = A·B(k-1) / (k + A·B(k-1))`, which avoids the factorials
/// of the closed form.
pub fn erlang_b(offered_load: f64, agents: u32) -> f64 {
    let mut blocking = 1.0;
    for k in 1..=agents {
        let numerator = offered_load * blocking;
        blocking = numerator / (f64::from(k) + numerator);
    }
    blocking
}

/// Probability that a contact has to wait. Requires `agents > offered_load`;
/// returns 1.0 otherwise (every contact waits in an unstable queue).
pub fn erlang_c(offered_load: f64, agents: u32) -> f64 {
    if offered_load <= 0.0 {
        return 0.0;
    }
    let n = f64::from(agents);
    if n <= offered_load {
        return 1.0;
    }
    let blocking = erlang_b(offered_load, agents);
    let wait = n * blocking / (n - offered_load * (1.0 - blocking));
    wait.clamp(0.0, 1.0)
}

/// Fraction of contacts answered within `answer_secs`.
pub fn service_level(offered_load: f64, agents: u32, aht_secs: f64, answer_secs: f64) -> f64 {
    if offered_load <= 0.0 {
        return 1.0;
    }
    let n = f64::from(agents);
    if n <= offered_load {
        return 0.0;
    }
    let wait = erlang_c(offered_load, agents);
    let level = 1.0 - wait * (-(n - offered_load) * answer_secs / aht_secs).exp();
    level.clamp(0.0, 1.0)
}
