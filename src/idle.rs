use crate::perf_script::Sample;
use regex::Regex;
use std::sync::LazyLock;

const IDLE_PROCESS: &str = "swapper";
const IDLE_FUNCTIONS: &[&str] = &[
    "cpuidle",
    "cpu_idle",
    "cpu_bringup_and_idle",
    "native_safe_halt",
    "xen_hypercall_sched_op",
    "xen_hypercall_vcpu_op",
];

static IDLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!("{}.*({})", IDLE_PROCESS, IDLE_FUNCTIONS.join("|"));
    Regex::new(&pattern).expect("idle pattern")
});

/// True when the sample is the kernel idling: the idle process followed,
/// somewhere in its stack, by one of the known idle loops.
pub fn is_idle(sample: &Sample) -> bool {
    IDLE_RE.is_match(&sample.frames.join(";"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(frames: &[&str]) -> Sample {
        Sample {
            timestamp: 1.0,
            frames: frames.iter().map(|f| f.to_string()).collect(),
        }
    }

    #[test]
    fn swapper_in_idle_loop_is_idle() {
        assert!(is_idle(&sample(&[
            "swapper",
            "start_secondary",
            "cpu_startup_entry",
            "arch_cpu_idle",
            "default_idle",
            "native_safe_halt",
        ])));
        assert!(is_idle(&sample(&["swapper", "xen_hypercall_sched_op"])));
        assert!(is_idle(&sample(&["swapper", "cpuidle_enter_state", "intel_idle"])));
    }

    #[test]
    fn swapper_doing_real_work_is_not_idle() {
        assert!(!is_idle(&sample(&["swapper", "irq_exit", "__do_softirq", "net_rx_action"])));
        assert!(!is_idle(&sample(&["swapper"])));
    }

    #[test]
    fn idle_function_in_other_process_is_not_idle() {
        assert!(!is_idle(&sample(&["java", "native_safe_halt"])));
        // the idle process has to come before the idle function
        assert!(!is_idle(&sample(&["cpu_idle", "swapper"])));
    }

    #[test]
    fn classification_is_stable() {
        let s = sample(&["swapper", "default_idle", "native_safe_halt"]);
        assert_eq!(is_idle(&s), is_idle(&s.clone()));
    }
}
