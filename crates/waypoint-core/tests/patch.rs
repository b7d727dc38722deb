//! Tests for breakpoint-guarded patching

use std::cell::Cell;
use std::rc::Rc;

use waypoint_core::breakpoints::{
    BreakpointDirectory, BreakpointInfo, BreakpointKind, BreakpointStore, NoRefresh, OverwriteDecision, PatchGuard,
    RefreshNotifier,
};
use waypoint_core::error::{Result, WaypointError};
use waypoint_core::memory::{MemoryImage, TargetMemory};
use waypoint_core::types::Address;
use waypoint_core::{Session, SessionConfig};

const BASE: Address = Address::new(0x40_0000);

fn image() -> MemoryImage
{
    let mut image = MemoryImage::new();
    image.map(BASE, (0u8..32).collect());
    image
}

struct CountingNotifier(Rc<Cell<usize>>);

impl RefreshNotifier for CountingNotifier
{
    fn notify_memory_changed(&self)
    {
        self.0.set(self.0.get() + 1);
    }
}

#[test]
fn test_patch_without_breakpoints_pads_with_fill()
{
    let mut memory = image();
    let mut breakpoints = BreakpointStore::new();
    let mut asked = 0;
    let mut confirm = |_: &str| {
        asked += 1;
        true
    };
    let refreshes = Rc::new(Cell::new(0));
    let notifier = CountingNotifier(Rc::clone(&refreshes));

    let report = PatchGuard::new(&mut memory, &mut breakpoints, &mut confirm, &notifier)
        .patch(BASE + 4, &[0xaa, 0xbb], 5, 0x90)
        .unwrap();

    assert_eq!(report.written, 5);
    assert!(report.removed_breakpoints.is_empty());
    assert_eq!(memory.read(BASE + 3, 7).unwrap(), vec![3, 0xaa, 0xbb, 0x90, 0x90, 0x90, 9]);
    assert_eq!(refreshes.get(), 1);
    assert_eq!(asked, 0);
}

#[test]
fn test_patch_truncates_long_input()
{
    let mut memory = image();
    let mut breakpoints = BreakpointStore::new();
    let mut confirm = |_: &str| true;

    let report = PatchGuard::new(&mut memory, &mut breakpoints, &mut confirm, &NoRefresh)
        .patch(BASE, &[0xff; 8], 2, 0)
        .unwrap();

    assert_eq!(report.written, 2);
    assert_eq!(memory.read(BASE, 3).unwrap(), vec![0xff, 0xff, 2]);
}

#[test]
fn test_declined_patch_changes_nothing()
{
    let mut memory = image();
    let mut breakpoints = BreakpointStore::new();
    breakpoints.insert(BASE + 6, BreakpointKind::Software);
    breakpoints.insert(BASE + 7, BreakpointKind::Software);
    let mut prompts = Vec::new();
    let mut confirm = |message: &str| {
        prompts.push(message.to_string());
        false
    };
    let refreshes = Rc::new(Cell::new(0));
    let notifier = CountingNotifier(Rc::clone(&refreshes));

    let err = PatchGuard::new(&mut memory, &mut breakpoints, &mut confirm, &notifier)
        .patch(BASE + 4, &[0; 8], 8, 0)
        .unwrap_err();

    assert!(matches!(err, WaypointError::PatchDeclined { conflicts: 2, .. }));
    assert_eq!(prompts.len(), 1);
    assert_eq!(memory.read(BASE + 4, 8).unwrap(), (4u8..12).collect::<Vec<_>>());
    assert!(breakpoints.find(BASE + 6).is_some());
    assert!(breakpoints.find(BASE + 7).is_some());
    assert_eq!(refreshes.get(), 0);
}

#[test]
fn test_accepted_patch_removes_breakpoints()
{
    let mut memory = image();
    let mut breakpoints = BreakpointStore::new();
    breakpoints.insert(BASE + 6, BreakpointKind::Software);
    breakpoints.insert(BASE + 20, BreakpointKind::Software);
    let mut confirm = |_: &str| true;

    let report = PatchGuard::new(&mut memory, &mut breakpoints, &mut confirm, &NoRefresh)
        .patch(BASE + 4, &[0xcc; 4], 4, 0)
        .unwrap();

    assert_eq!(report.removed_breakpoints, vec![BASE + 6]);
    assert!(breakpoints.find(BASE + 6).is_none());
    assert!(breakpoints.find(BASE + 20).is_some());
    assert_eq!(memory.read(BASE + 4, 4).unwrap(), vec![0xcc; 4]);
}

#[test]
fn test_zero_size_is_a_no_op()
{
    let mut memory = image();
    let mut breakpoints = BreakpointStore::new();
    breakpoints.insert(BASE, BreakpointKind::Software);
    let mut asked = false;
    let mut confirm = |_: &str| {
        asked = true;
        false
    };
    let refreshes = Rc::new(Cell::new(0));
    let notifier = CountingNotifier(Rc::clone(&refreshes));

    let report = PatchGuard::new(&mut memory, &mut breakpoints, &mut confirm, &notifier)
        .patch(BASE, &[1, 2, 3], 0, 0)
        .unwrap();

    assert_eq!(report.written, 0);
    assert!(!asked);
    assert_eq!(refreshes.get(), 0);
    assert_eq!(memory.read(BASE, 1).unwrap(), vec![0]);
}

#[test]
fn test_disabled_and_hardware_breakpoints_do_not_conflict()
{
    let mut memory = image();
    let mut breakpoints = BreakpointStore::new();
    breakpoints.insert(BASE + 1, BreakpointKind::Hardware);
    let disabled = breakpoints.insert(BASE + 2, BreakpointKind::Software);
    breakpoints.set_enabled(disabled, false).unwrap();
    let mut confirm = |_: &str| -> bool { panic!("no prompt expected") };

    let mut guard = PatchGuard::new(&mut memory, &mut breakpoints, &mut confirm, &NoRefresh);
    assert_eq!(guard.overwrite_check(BASE, 4).unwrap(), OverwriteDecision::Clear);
    guard.patch(BASE, &[9; 4], 4, 0).unwrap();
    drop(guard);

    assert_eq!(breakpoints.len(), 2);
    assert_eq!(memory.read(BASE, 4).unwrap(), vec![9; 4]);
}

#[test]
fn test_write_failure_is_reported()
{
    let mut memory = MemoryImage::new();
    memory.map_read_only(BASE, vec![0; 4]);
    let mut breakpoints = BreakpointStore::new();
    let mut confirm = |_: &str| true;

    let err = PatchGuard::new(&mut memory, &mut breakpoints, &mut confirm, &NoRefresh)
        .patch(BASE, &[1], 1, 0)
        .unwrap_err();
    assert!(matches!(err, WaypointError::MemoryWrite { .. }));
}

#[test]
fn test_session_patch_uses_configured_collaborators()
{
    let mut breakpoints = BreakpointStore::new();
    breakpoints.insert(BASE + 1, BreakpointKind::Software);
    let refreshes = Rc::new(Cell::new(0));

    let mut session = Session::new(Box::new(image()), &SessionConfig::default())
        .with_breakpoints(Box::new(breakpoints))
        .with_confirmation(Box::new(|_: &str| true))
        .with_notifier(Box::new(CountingNotifier(Rc::clone(&refreshes))));

    let report = session.patch(BASE, &[0xee], 2, 0x11).unwrap();
    assert_eq!(report.removed_breakpoints, vec![BASE + 1]);
    assert_eq!(session.memory().read(BASE, 3).unwrap(), vec![0xee, 0x11, 2]);
    assert!(session.breakpoints_mut().find(BASE + 1).is_none());
    assert_eq!(refreshes.get(), 1);
}

#[test]
fn test_session_declines_by_default()
{
    let mut breakpoints = BreakpointStore::new();
    breakpoints.insert(BASE, BreakpointKind::Software);
    let mut session = Session::new(Box::new(image()), &SessionConfig::default()).with_breakpoints(Box::new(breakpoints));

    assert!(matches!(
        session.patch(BASE, &[1], 1, 0),
        Err(WaypointError::PatchDeclined { conflicts: 1, .. })
    ));
    assert_eq!(session.memory().read(BASE, 1).unwrap(), vec![0]);
}

/// Directory that refuses to remove one particular breakpoint.
struct StubbornDirectory
{
    inner: BreakpointStore,
    stuck: Address,
}

impl BreakpointDirectory for StubbornDirectory
{
    fn find(&self, address: Address) -> Option<BreakpointInfo>
    {
        self.inner.find(address)
    }

    fn remove(&mut self, address: Address) -> Result<()>
    {
        if address == self.stuck {
            return Err(WaypointError::InvalidArgument("breakpoint is locked".to_string()));
        }
        self.inner.remove(address)
    }
}

#[test]
fn test_failed_removal_stops_before_writing()
{
    let mut memory = image();
    let mut inner = BreakpointStore::new();
    inner.insert(BASE + 1, BreakpointKind::Software);
    inner.insert(BASE + 2, BreakpointKind::Software);
    inner.insert(BASE + 3, BreakpointKind::Software);
    let mut breakpoints = StubbornDirectory { inner, stuck: BASE + 2 };
    let mut confirm = |_: &str| true;
    let refreshes = Rc::new(Cell::new(0));
    let notifier = CountingNotifier(Rc::clone(&refreshes));

    let err = PatchGuard::new(&mut memory, &mut breakpoints, &mut confirm, &notifier)
        .patch(BASE, &[0xcc; 4], 4, 0)
        .unwrap_err();

    assert!(matches!(err, WaypointError::InvalidArgument(_)));
    assert_eq!(memory.read(BASE, 4).unwrap(), vec![0, 1, 2, 3]);
    assert_eq!(refreshes.get(), 0);
    // removal runs in address order and stops at the failure
    assert!(breakpoints.find(BASE + 1).is_none());
    assert!(breakpoints.find(BASE + 2).is_some());
    assert!(breakpoints.find(BASE + 3).is_some());
}
