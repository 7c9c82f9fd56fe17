//! The CPU topology registry: one record per possible CPU, indexed by local APIC ID.
//!
//! Records are shared between the cores without a lock. Every status field has exactly one
//! writer at a time: the BSP while a core is being started, the core itself afterwards.

use core::sync::atomic::{AtomicBool, AtomicPtr, AtomicU32, AtomicUsize, Ordering};
use core::ptr;

use bare_metal::tss::Tss;

use crate::config::MAX_CPU;

pub mod startup;
pub mod trampoline;

/// Lifecycle state of a core, also reported as the panic context.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u32)]
pub enum CpuStatus {
    /// Not known to exist.
    None = 0,
    Running = 1,
    /// Initialized and held until it is released to schedule.
    Fenced = 2,
    /// Startup IPIs were sent but the core has not reported back yet.
    Starting = 3,
    Idle = 4,
    /// Administratively powered off.
    Off = 5,
    /// Handling a CPU exception.
    Exception = 6,
    /// Servicing an interrupt.
    Service = 7,
}

impl CpuStatus {
    pub fn from_u32(value: u32) -> Option<CpuStatus> {
        Some(match value {
            0 => CpuStatus::None,
            1 => CpuStatus::Running,
            2 => CpuStatus::Fenced,
            3 => CpuStatus::Starting,
            4 => CpuStatus::Idle,
            5 => CpuStatus::Off,
            6 => CpuStatus::Exception,
            7 => CpuStatus::Service,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            CpuStatus::None => "CPU_NONE",
            CpuStatus::Running => "CPU_RUNNING",
            CpuStatus::Fenced => "CPU_FENCED",
            CpuStatus::Starting => "CPU_STARTING",
            CpuStatus::Idle => "CPU_IDLE",
            CpuStatus::Off => "CPU_OFF",
            CpuStatus::Exception => "CPU_EXCEPTION",
            CpuStatus::Service => "CPU_SERVICE",
        }
    }
}

/// Architecture specific part of a CPU record.
pub struct ArchCpu {
    pub tss: Tss,
}

/// Everything the kernel knows about one core.
pub struct CpuRecord {
    /// Points at the record itself once the registry is initialized, so that the record can be
    /// found through the kernel gs base.
    this: AtomicPtr<CpuRecord>,
    number: AtomicUsize,
    is_bsp: AtomicBool,
    fenced: AtomicBool,
    status: AtomicU32,
    pub arch: spin::Mutex<ArchCpu>,
}

impl CpuRecord {
    pub const fn new() -> CpuRecord {
        CpuRecord {
            this: AtomicPtr::new(ptr::null_mut()),
            number: AtomicUsize::new(0),
            is_bsp: AtomicBool::new(false),
            fenced: AtomicBool::new(false),
            status: AtomicU32::new(CpuStatus::None as u32),
            arch: spin::Mutex::new(ArchCpu { tss: Tss::new() }),
        }
    }

    pub fn number(&self) -> usize {
        self.number.load(Ordering::Relaxed)
    }

    pub fn is_bsp(&self) -> bool {
        self.is_bsp.load(Ordering::Relaxed)
    }

    pub fn fenced(&self) -> bool {
        self.fenced.load(Ordering::Acquire)
    }

    pub fn status(&self) -> CpuStatus {
        CpuStatus::from_u32(self.status.load(Ordering::Acquire)).unwrap_or(CpuStatus::None)
    }

    pub fn set_status(&self, status: CpuStatus) {
        self.status.store(status as u32, Ordering::Release);
    }

    /// Address published through `IA32_KERNEL_GS_BASE`.
    pub fn self_pointer(&self) -> *mut CpuRecord {
        self.this.load(Ordering::Relaxed)
    }

    fn reset(&self, number: usize) {
        self.this.store(self as *const CpuRecord as *mut CpuRecord, Ordering::Relaxed);
        self.number.store(number, Ordering::Relaxed);
        self.is_bsp.store(false, Ordering::Relaxed);
        // everything but the first CPU starts out held
        self.fenced.store(number != 0, Ordering::Relaxed);
        self.set_status(CpuStatus::None);
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RegistryError {
    /// A core reported an APIC ID that has no record.
    IdOutOfRange { id: u32, capacity: usize },
}

/// One record per supported CPU plus the number of CPUs that were discovered.
pub struct CpuRegistry {
    records: [CpuRecord; MAX_CPU],
    count: AtomicUsize,
}

impl CpuRegistry {
    pub const fn new() -> CpuRegistry {
        const EMPTY: CpuRecord = CpuRecord::new();
        CpuRegistry {
            records: [EMPTY; MAX_CPU],
            count: AtomicUsize::new(0),
        }
    }

    /// Bring every record into the "not present" baseline. Runs on the BSP before any discovery.
    pub fn bp_init(&self) {
        self.count.store(0, Ordering::Relaxed);
        for (number, record) in self.records.iter().enumerate() {
            record.reset(number);
        }
    }

    pub fn capacity(&self) -> usize {
        MAX_CPU
    }

    /// Number of CPUs discovered on the platform.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    pub fn set_count(&self, count: usize) {
        self.count.store(count, Ordering::Release);
    }

    pub fn record(&self, number: usize) -> Option<&CpuRecord> {
        self.records.get(number)
    }

    pub fn records(&self) -> &[CpuRecord] {
        &self.records
    }

    /// Look up the record of the core with the given APIC ID.
    pub fn by_apic_id(&self, id: u32) -> Result<&CpuRecord, RegistryError> {
        self.records.get(id as usize).ok_or(RegistryError::IdOutOfRange { id, capacity: MAX_CPU })
    }

    /// Register the boot processor under its APIC ID and mark it running.
    pub fn claim_bsp(&self, id: u32) -> Result<&CpuRecord, RegistryError> {
        let record = self.by_apic_id(id)?;
        record.number.store(id as usize, Ordering::Relaxed);
        record.is_bsp.store(true, Ordering::Relaxed);
        record.fenced.store(false, Ordering::Release);
        record.set_status(CpuStatus::Running);
        Ok(record)
    }

    /// The record that was claimed as boot processor, if any.
    pub fn bsp(&self) -> Option<&CpuRecord> {
        self.records.iter().find(|r| r.is_bsp())
    }
}
