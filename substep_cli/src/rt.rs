//! Real-time scheduling helpers (Linux SCHED_FIFO / affinity / mlockall; macOS mlockall).

use crate::cli::RtLock;

#[derive(Debug, Clone, Copy)]
pub struct RtRequest {
    pub prio: Option<i32>,
    pub lock: RtLock,
    pub cpu: Option<usize>,
}

#[cfg(unix)]
fn lock_memory(lock: RtLock) -> std::io::Result<()> {
    use libc::{MCL_CURRENT, MCL_FUTURE, mlockall};
    let flags = match lock {
        RtLock::None => return Ok(()),
        RtLock::Current => MCL_CURRENT,
        RtLock::All => MCL_CURRENT | MCL_FUTURE,
    };
    let rc = unsafe { mlockall(flags) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(target_os = "linux")]
fn fifo_priority(prio: Option<i32>) -> std::io::Result<i32> {
    use libc::{SCHED_FIFO, sched_get_priority_max, sched_get_priority_min, sched_param};
    let (min, max) = unsafe {
        (
            sched_get_priority_min(SCHED_FIFO),
            sched_get_priority_max(SCHED_FIFO),
        )
    };
    let (min, max) = if min < 0 || max < 0 { (1, 99) } else { (min, max) };
    let wanted = prio.unwrap_or(max).clamp(min, max);
    let param = sched_param {
        sched_priority: wanted,
    };
    let rc = unsafe { libc::sched_setscheduler(0, SCHED_FIFO, &param) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(wanted)
}

#[cfg(target_os = "linux")]
fn pin_cpu(cpu: usize) -> eyre::Result<()> {
    const MAX_CPUSET_BITS: usize = std::mem::size_of::<libc::cpu_set_t>() * 8;
    if cpu >= MAX_CPUSET_BITS {
        eyre::bail!("requested CPU {cpu} exceeds cpu_set_t capacity {MAX_CPUSET_BITS}");
    }
    let online = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
    if online < 1 || cpu as libc::c_long >= online {
        eyre::bail!("requested CPU {cpu} >= online {online}");
    }
    let mut set: libc::cpu_set_t = unsafe { std::mem::zeroed() };
    unsafe {
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(cpu, &mut set);
    }
    let rc = unsafe { libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set) };
    if rc != 0 {
        return Err(eyre::eyre!(std::io::Error::last_os_error()));
    }
    Ok(())
}

/// Apply the request once per process. Failures are logged and the run
/// continues without the missing guarantee.
pub fn setup_rt_once(req: RtRequest) {
    use std::sync::OnceLock;
    static RT_ONCE: OnceLock<()> = OnceLock::new();

    RT_ONCE.get_or_init(|| {
        #[cfg(unix)]
        {
            match lock_memory(req.lock) {
                Ok(()) => tracing::info!(lock = ?req.lock, "rt: memory lock applied"),
                Err(e) => tracing::warn!(
                    lock = ?req.lock,
                    error = %e,
                    "rt: mlockall failed; needs CAP_IPC_LOCK (or root) and sufficient 'ulimit -l'"
                ),
            }
        }

        #[cfg(target_os = "linux")]
        {
            match fifo_priority(req.prio) {
                Ok(prio) => tracing::info!(prio, "rt: SCHED_FIFO applied"),
                Err(e) => tracing::warn!(
                    error = %e,
                    "rt: SCHED_FIFO failed; needs CAP_SYS_NICE or root"
                ),
            }
            let cpu = req.cpu.unwrap_or(0);
            match pin_cpu(cpu) {
                Ok(()) => tracing::info!(cpu, "rt: affinity applied"),
                Err(e) => tracing::warn!(cpu, error = %e, "rt: affinity not applied"),
            }
        }

        #[cfg(not(target_os = "linux"))]
        {
            let _ = (req.prio, req.cpu);
            tracing::warn!("rt: SCHED_FIFO and affinity are Linux only; only mlockall applied");
        }
    });
}
