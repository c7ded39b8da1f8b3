//! Shared fakes: an in-memory host and a scripted foreign module that
//! speaks the raw boundary tables, record-keeping included.

#![allow(
    dead_code,
    missing_docs,
    unsafe_code,
    clippy::missing_docs_in_private_items,
    clippy::panic,
    clippy::unwrap_used
)]

use std::cell::RefCell;
use std::ffi::CStr;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use gantry::{
    Area, Body, DebugSink, Delay, FirstLine, Header, Host, ImportanceLevel, LogVerbosity, Message,
    Name, NamedValueVisitor, Options, SharedMessage, Transaction, Version,
};
use gantry_abi::{
    ForeignTable, HOST_ID_NONE, NAME_ID_UNIDENTIFIED, OptionsRef, PanicOps, RawArea, RawBuf,
    RawLocation, RawName, RawPanic, RawSharedMessage, RawStr, ServiceHandle, ServiceTable,
    SinkRef, XactionHandle, XactionRef, XactionTable,
};
use libc::{c_char, c_void, timeval};

pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn new_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn record(log: &CallLog, entry: impl Into<String>) {
    log.lock().unwrap().push(entry.into());
}

pub fn drain(log: &CallLog) -> Vec<String> {
    std::mem::take(&mut *log.lock().unwrap())
}

// ---- host fakes ----------------------------------------------------------

/// Debug sink appending into a shared buffer.
pub struct SinkBuffer(pub Arc<Mutex<Vec<u8>>>);

impl DebugSink for SinkBuffer {
    fn write(&mut self, bytes: &[u8]) {
        self.0.lock().unwrap().extend_from_slice(bytes);
    }
}

/// Observation points into the process-wide test host.
pub struct HostProbe {
    pub debug: Arc<Mutex<Vec<u8>>>,
    pub closed_sinks: Arc<Mutex<usize>>,
}

thread_local! {
    /// Liveness flag of the message most recently created on this thread.
    static LAST_ALIVE: RefCell<Option<Arc<AtomicBool>>> = const { RefCell::new(None) };
}

/// Liveness flag of the message most recently created by this test.
pub fn last_message_alive() -> Arc<AtomicBool> {
    LAST_ALIVE.with(|slot| slot.borrow().clone()).unwrap()
}

struct TestHost {
    debug: Arc<Mutex<Vec<u8>>>,
    closed_sinks: Arc<Mutex<usize>>,
}

impl TestHost {
    fn track(message: TestMessage) -> SharedMessage {
        let alive = Arc::new(AtomicBool::new(false));
        LAST_ALIVE.with(|slot| *slot.borrow_mut() = Some(Arc::clone(&alive)));
        SharedMessage::new(message.with_alive(alive))
    }
}

impl Host for TestHost {
    fn uri(&self) -> String {
        "test-pipeline/1.0".to_owned()
    }

    fn describe(&self) -> String {
        "in-memory adaptation pipeline".to_owned()
    }

    fn open_debug(&self, verbosity: LogVerbosity) -> Option<Box<dyn DebugSink>> {
        (verbosity.importance > ImportanceLevel::Debug)
            .then(|| Box::new(SinkBuffer(Arc::clone(&self.debug))) as Box<dyn DebugSink>)
    }

    fn close_debug(&self, sink: Box<dyn DebugSink>) {
        drop(sink);
        *self.closed_sinks.lock().unwrap() += 1;
    }

    fn new_request(&self) -> SharedMessage {
        Self::track(TestMessage::request())
    }

    fn new_response(&self) -> SharedMessage {
        Self::track(TestMessage::response())
    }
}

static PROBE: OnceLock<HostProbe> = OnceLock::new();

/// Installs the process-wide test host on first use.
pub fn ensure_host() -> &'static HostProbe {
    PROBE.get_or_init(|| {
        let debug = Arc::new(Mutex::new(Vec::new()));
        let closed_sinks = Arc::new(Mutex::new(0));
        gantry::install(Box::new(TestHost {
            debug: Arc::clone(&debug),
            closed_sinks: Arc::clone(&closed_sinks),
        }))
        .unwrap();
        HostProbe {
            debug,
            closed_sinks,
        }
    })
}

pub struct TestLine {
    pub version: Version,
    pub protocol: Name,
}

impl FirstLine for TestLine {
    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn protocol(&self) -> &Name {
        &self.protocol
    }

    fn set_protocol(&mut self, protocol: Name) {
        self.protocol = protocol;
    }
}

#[derive(Default)]
pub struct TestHeader {
    pub fields: Vec<(Name, Vec<u8>)>,
}

impl Header for TestHeader {
    fn has_any(&self, name: &Name) -> bool {
        self.fields.iter().any(|(field, _)| field == name)
    }

    fn value(&self, name: &Name) -> Option<Area> {
        let matching: Vec<&[u8]> = self
            .fields
            .iter()
            .filter(|(field, _)| field == name)
            .map(|(_, value)| value.as_slice())
            .collect();
        if matching.is_empty() {
            None
        } else {
            Some(Area::from_bytes(&matching.join(&b", "[..])))
        }
    }

    fn add(&mut self, name: Name, value: Area) {
        self.fields.push((name, value.as_bytes().to_vec()));
    }

    fn remove_any(&mut self, name: &Name) {
        self.fields.retain(|(field, _)| field != name);
    }

    fn visit_each(&self, visitor: &mut dyn NamedValueVisitor) {
        for (name, value) in &self.fields {
            visitor.visit(name, &Area::from_bytes(value));
        }
    }

    fn image(&self) -> Area {
        let mut image = Vec::new();
        for (name, value) in &self.fields {
            image.extend_from_slice(name.image().unwrap_or(b"?"));
            image.extend_from_slice(b": ");
            image.extend_from_slice(value);
            image.extend_from_slice(b"\r\n");
        }
        Area::from_bytes(&image)
    }

    fn parse(&mut self, image: &Area) -> gantry::Result<()> {
        let text = String::from_utf8_lossy(image.as_bytes()).into_owned();
        let mut fields = Vec::new();
        for line in text.lines().filter(|line| !line.is_empty()) {
            let (name, value) = line
                .split_once(": ")
                .ok_or_else(|| gantry::Error::HeaderParse(format!("bad field line {line:?}")))?;
            fields.push((Name::new_known(name.as_bytes().to_vec()), value.into()));
        }
        self.fields = fields;
        Ok(())
    }
}

pub struct TestBody {
    pub size: Option<u64>,
}

impl Body for TestBody {
    fn size(&self) -> Option<u64> {
        self.size
    }
}

pub struct TestMessage {
    pub line: TestLine,
    pub header: TestHeader,
    pub body: Option<TestBody>,
    pub trailer: Option<TestHeader>,
    /// Cleared on drop, for liveness assertions.
    pub alive: Option<Arc<AtomicBool>>,
}

impl TestMessage {
    pub fn request() -> Self {
        Self {
            line: TestLine {
                version: Version {
                    major: Some(1),
                    minor: Some(1),
                    micro: None,
                },
                protocol: Name::new_known("HTTP"),
            },
            header: TestHeader::default(),
            body: None,
            trailer: None,
            alive: None,
        }
    }

    pub fn response() -> Self {
        Self::request()
    }

    pub fn with_alive(mut self, alive: Arc<AtomicBool>) -> Self {
        alive.store(true, Ordering::SeqCst);
        self.alive = Some(alive);
        self
    }
}

impl Drop for TestMessage {
    fn drop(&mut self) {
        if let Some(alive) = &self.alive {
            alive.store(false, Ordering::SeqCst);
        }
    }
}

impl Message for TestMessage {
    fn clone_message(&self) -> SharedMessage {
        SharedMessage::new(Self {
            line: TestLine {
                version: self.line.version,
                protocol: self.line.protocol.clone(),
            },
            header: TestHeader {
                fields: self.header.fields.clone(),
            },
            body: self.body.as_ref().map(|body| TestBody { size: body.size }),
            trailer: self.trailer.as_ref().map(|trailer| TestHeader {
                fields: trailer.fields.clone(),
            }),
            alive: None,
        })
    }

    fn first_line(&self) -> &dyn FirstLine {
        &self.line
    }

    fn first_line_mut(&mut self) -> &mut dyn FirstLine {
        &mut self.line
    }

    fn header(&self) -> &dyn Header {
        &self.header
    }

    fn header_mut(&mut self) -> &mut dyn Header {
        &mut self.header
    }

    fn add_body(&mut self) {
        self.body = Some(TestBody { size: None });
    }

    fn body(&self) -> Option<&dyn Body> {
        self.body.as_ref().map(|body| body as &dyn Body)
    }

    fn body_mut(&mut self) -> Option<&mut dyn Body> {
        self.body.as_mut().map(|body| body as &mut dyn Body)
    }

    fn add_trailer(&mut self) {
        self.trailer = Some(TestHeader::default());
    }

    fn trailer(&self) -> Option<&dyn Header> {
        self.trailer.as_ref().map(|trailer| trailer as &dyn Header)
    }

    fn trailer_mut(&mut self) -> Option<&mut dyn Header> {
        self.trailer
            .as_mut()
            .map(|trailer| trailer as &mut dyn Header)
    }
}

/// Host-side exception payload with observable identity.
#[derive(Debug, PartialEq, Eq)]
pub struct Boom(pub String);

pub struct TestTransaction {
    pub calls: CallLog,
    pub virgin: TestMessage,
    pub cause: TestMessage,
    pub adapted: Option<SharedMessage>,
    /// Bytes served through `virgin_body_content`.
    pub vb: Vec<u8>,
    pub boom_on_use_virgin: bool,
    pub boom_on_vb_content: bool,
}

impl TestTransaction {
    pub fn new(calls: CallLog) -> Self {
        Self {
            calls,
            virgin: TestMessage::request(),
            cause: TestMessage::request(),
            adapted: None,
            vb: Vec::new(),
            boom_on_use_virgin: false,
            boom_on_vb_content: false,
        }
    }
}

impl Transaction for TestTransaction {
    fn virgin(&mut self) -> &mut dyn Message {
        &mut self.virgin
    }

    fn cause(&mut self) -> &dyn Message {
        &self.cause
    }

    fn adapted(&mut self) -> &mut dyn Message {
        match self.adapted.as_mut().and_then(SharedMessage::get_mut) {
            Some(message) => message,
            None => panic!("no adapted message"),
        }
    }

    fn use_virgin(&mut self) {
        if self.boom_on_use_virgin {
            std::panic::panic_any(Boom("kaboom".to_owned()));
        }
        record(&self.calls, "use_virgin");
    }

    fn use_adapted(&mut self, message: SharedMessage) {
        record(&self.calls, "use_adapted");
        self.adapted = Some(message);
    }

    fn block_virgin(&mut self) {
        record(&self.calls, "block_virgin");
    }

    fn adaptation_delayed(&mut self, delay: &Delay) {
        record(
            &self.calls,
            format!(
                "adaptation_delayed {} {:.1}",
                delay.description.as_deref().unwrap_or("-"),
                delay.progress.unwrap_or(-1.0)
            ),
        );
    }

    fn adaptation_aborted(&mut self) {
        record(&self.calls, "adaptation_aborted");
    }

    fn resume(&mut self) {
        record(&self.calls, "resume");
    }

    fn virgin_body_discard(&mut self) {
        record(&self.calls, "vb_discard");
    }

    fn virgin_body_make(&mut self) {
        record(&self.calls, "vb_make");
    }

    fn virgin_body_make_more(&mut self) {
        record(&self.calls, "vb_make_more");
    }

    fn virgin_body_stop_making(&mut self) {
        record(&self.calls, "vb_stop_making");
    }

    fn virgin_body_pause(&mut self) {
        record(&self.calls, "vb_pause");
    }

    fn virgin_body_resume(&mut self) {
        record(&self.calls, "vb_resume");
    }

    fn virgin_body_content(&mut self, offset: usize, size: usize) -> Area {
        if self.boom_on_vb_content {
            panic!("virgin body unavailable");
        }
        record(&self.calls, format!("vb_content {offset}+{size}"));
        let start = offset.min(self.vb.len());
        let end = (offset + size).min(self.vb.len());
        Area::from_bytes(&self.vb[start..end])
    }

    fn virgin_body_content_shift(&mut self, size: usize) {
        record(&self.calls, format!("vb_content_shift {size}"));
    }

    fn adapted_body_content_done(&mut self, at_end: bool) {
        record(&self.calls, format!("ab_content_done at_end={at_end}"));
    }

    fn adapted_body_content_available(&mut self) {
        record(&self.calls, "ab_content_available");
    }
}

/// Option set backed by a literal list.
pub struct TestOptions(pub Vec<(&'static str, &'static str)>);

impl Options for TestOptions {
    fn option(&self, name: &Name) -> Option<Area> {
        self.0
            .iter()
            .find(|(key, _)| Name::new_known(*key) == *name)
            .map(|(_, value)| Area::from_bytes(value.as_bytes()))
    }

    fn visit_each(&self, visitor: &mut dyn NamedValueVisitor) {
        for (key, value) in &self.0 {
            visitor.visit(&Name::new_known(*key), &Area::from_bytes(value.as_bytes()));
        }
    }
}

// ---- foreign module fake -------------------------------------------------

thread_local! {
    /// The fake module's panic-record channel, most recent last.
    static FOREIGN_RECORDS: RefCell<Vec<(bool, String, Option<(&'static str, i32, i32)>)>> =
        const { RefCell::new(Vec::new()) };
}

pub fn push_foreign_record(
    host_origin: bool,
    message: impl Into<String>,
    location: Option<(&'static str, i32, i32)>,
) {
    FOREIGN_RECORDS.with(|records| {
        records
            .borrow_mut()
            .push((host_origin, message.into(), location));
    });
}

pub fn pending_foreign_records() -> usize {
    FOREIGN_RECORDS.with(|records| records.borrow().len())
}

/// Copies a record buffer without adopting it.
pub unsafe fn copy_raw_buf(buf: &RawBuf) -> String {
    if buf.ptr.is_null() || buf.len == 0 {
        return String::new();
    }
    let bytes = unsafe { std::slice::from_raw_parts(buf.ptr.cast::<u8>().cast_const(), buf.len) };
    String::from_utf8_lossy(bytes).into_owned()
}

/// Adopts a transfer buffer's text, releasing it through the host table.
pub unsafe fn take_buf_string(buf: RawBuf) -> String {
    let text = unsafe { copy_raw_buf(&buf) };
    unsafe { (gantry::host_table().buf.free)(buf) };
    text
}

/// Builds an unregistered name view over a static string.
pub fn raw_name(text: &'static str) -> RawName {
    RawName {
        image: RawStr {
            len: text.len(),
            ptr: text.as_ptr().cast::<c_char>(),
        },
        id: NAME_ID_UNIDENTIFIED,
        host_id: HOST_ID_NONE,
    }
}

/// Copies an area's bytes, releasing the area through the host table.
pub unsafe fn take_area_bytes(mut area: RawArea) -> Vec<u8> {
    let bytes = if area.ptr.is_null() || area.len == 0 {
        Vec::new()
    } else {
        unsafe { std::slice::from_raw_parts(area.ptr.cast::<u8>(), area.len) }.to_vec()
    };
    unsafe { (gantry::host_table().area.free)(&raw mut area) };
    bytes
}

fn host_buf(text: &str) -> RawBuf {
    let table = gantry::host_table();
    unsafe { (table.buf.new)(text.as_ptr().cast::<c_char>(), text.len()) }
}

unsafe extern "C" fn foreign_panic_pop(out: *mut RawPanic) -> bool {
    let Some((host_origin, message, location)) =
        FOREIGN_RECORDS.with(|records| records.borrow_mut().pop())
    else {
        return false;
    };
    let location = match location {
        Some((file, line, column)) => RawLocation {
            file: host_buf(file),
            line,
            column,
        },
        None => RawLocation {
            file: RawBuf {
                len: 0,
                ptr: std::ptr::null_mut(),
                cap: 0,
            },
            line: 0,
            column: 0,
        },
    };
    unsafe {
        out.write(RawPanic {
            host_origin,
            message: host_buf(&message),
            location,
        });
    }
    true
}

unsafe extern "C" fn foreign_panic_free(record: RawPanic) {
    let table = gantry::host_table();
    unsafe {
        (table.buf.free)(record.message);
        if !record.location.file.ptr.is_null() {
            (table.buf.free)(record.location.file);
        }
    }
}

/// Reaction of the fake module to a failed host callback: adopt the host
/// record and re-report it on the module's own channel.
pub unsafe fn propagate_host_failure() {
    let table = gantry::host_table();
    let mut slot = MaybeUninit::<RawPanic>::uninit();
    assert!(unsafe { (table.panic.pop)(slot.as_mut_ptr()) });
    let raw = unsafe { slot.assume_init() };
    let message = unsafe { copy_raw_buf(&raw.message) };
    let host_origin = raw.host_origin;
    unsafe { (table.panic.free)(raw) };
    push_foreign_record(host_origin, message, None);
}

pub struct ForeignService {
    pub uri: String,
    pub tag: String,
    pub is_async: bool,
    pub calls: CallLog,
    /// Constructs the per-transaction state.
    pub make: fn(&mut ForeignService, XactionRef) -> ForeignXaction,
    /// Installed as `on_start` of every transaction `plain_make` builds.
    pub on_start: Option<fn(&mut ForeignXaction) -> bool>,
    /// Installed as `on_resume` of every transaction `plain_make` builds.
    pub on_resume: Option<fn(&mut ForeignXaction) -> bool>,
}

pub struct ForeignXaction {
    pub calls: CallLog,
    pub host: XactionRef,
    /// Adapted content currently held by the module.
    pub content: Option<Vec<u8>>,
    /// Installed into `content` when the host asks for an adapted body.
    pub pending_content: Option<Vec<u8>>,
    /// Scripted reaction to `start`; defaults to plain success.
    pub on_start: Option<fn(&mut ForeignXaction) -> bool>,
    /// Scripted reaction to `resume`; defaults to plain success.
    pub on_resume: Option<fn(&mut ForeignXaction) -> bool>,
    /// Virgin bytes read back through the host during the transaction.
    pub seen_virgin: Arc<Mutex<Vec<u8>>>,
}

impl ForeignXaction {
    pub fn plain(calls: CallLog, host: XactionRef) -> Self {
        Self {
            calls,
            host,
            content: None,
            pending_content: None,
            on_start: None,
            on_resume: None,
            seen_virgin: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

pub fn plain_make(service: &mut ForeignService, host: XactionRef) -> ForeignXaction {
    let mut xaction = ForeignXaction::plain(Arc::clone(&service.calls), host);
    xaction.on_start = service.on_start;
    xaction.on_resume = service.on_resume;
    xaction
}

unsafe fn service_of<'a>(handle: ServiceHandle) -> &'a mut ForeignService {
    unsafe { &mut *handle.cast::<ForeignService>() }
}

unsafe fn xaction_of<'a>(handle: XactionHandle) -> &'a mut ForeignXaction {
    unsafe { &mut *handle.cast::<ForeignXaction>() }
}

unsafe extern "C" fn service_uri(handle: ServiceHandle, out: *mut RawBuf) -> bool {
    let service = unsafe { service_of(handle) };
    record(&service.calls, "uri");
    unsafe { out.write(host_buf(&service.uri)) };
    true
}

unsafe extern "C" fn service_tag(handle: ServiceHandle, out: *mut RawBuf) -> bool {
    let service = unsafe { service_of(handle) };
    record(&service.calls, "tag");
    unsafe { out.write(host_buf(&service.tag)) };
    true
}

unsafe extern "C" fn service_describe(handle: ServiceHandle, sink: SinkRef) -> bool {
    let service = unsafe { service_of(handle) };
    record(&service.calls, "describe");
    let table = gantry::host_table();
    let text = format!("{} (scripted fake)", service.uri);
    unsafe { (table.host.debug_write)(sink, text.as_ptr().cast::<c_char>(), text.len()) }
}

unsafe extern "C" fn service_is_async(handle: ServiceHandle, out: *mut bool) -> bool {
    let service = unsafe { service_of(handle) };
    record(&service.calls, "is_async");
    unsafe { out.write(service.is_async) };
    true
}

/// Reads the `mode` option and every visited pair through the host table.
unsafe fn read_options(options: OptionsRef) -> String {
    let table = gantry::host_table();
    let raw_name = RawName {
        image: RawStr {
            len: 4,
            ptr: c"mode".as_ptr(),
        },
        id: NAME_ID_UNIDENTIFIED,
        host_id: HOST_ID_NONE,
    };
    let mut area = MaybeUninit::<RawArea>::uninit();
    if !unsafe { (table.options.value)(options, &raw const raw_name, area.as_mut_ptr()) } {
        return String::from("<failed>");
    }
    let mut area = unsafe { area.assume_init() };
    let value = if area.ptr.is_null() || area.len == 0 {
        String::new()
    } else {
        let bytes = unsafe {
            std::slice::from_raw_parts(area.ptr.cast::<u8>(), area.len)
        };
        String::from_utf8_lossy(bytes).into_owned()
    };
    unsafe { (table.area.free)(&raw mut area) };
    value
}

unsafe extern "C" fn service_configure(handle: ServiceHandle, options: OptionsRef) -> bool {
    let service = unsafe { service_of(handle) };
    let mode = unsafe { read_options(options) };
    record(&service.calls, format!("configure mode={mode}"));
    true
}

unsafe extern "C" fn count_visit(
    _name: *const RawName,
    _value: *const c_char,
    _len: usize,
    extra: *mut c_void,
) {
    unsafe { *extra.cast::<usize>() += 1 };
}

unsafe extern "C" fn service_reconfigure(handle: ServiceHandle, options: OptionsRef) -> bool {
    let service = unsafe { service_of(handle) };
    let mode = unsafe { read_options(options) };
    let mut visited = 0usize;
    let table = gantry::host_table();
    if !unsafe { (table.options.visit)(options, count_visit, (&raw mut visited).cast::<c_void>()) }
    {
        return false;
    }
    record(
        &service.calls,
        format!("reconfigure mode={mode} options={visited}"),
    );
    true
}

unsafe extern "C" fn service_start(handle: ServiceHandle) -> bool {
    record(&unsafe { service_of(handle) }.calls, "start");
    true
}

unsafe extern "C" fn service_stop(handle: ServiceHandle) -> bool {
    record(&unsafe { service_of(handle) }.calls, "stop");
    true
}

unsafe extern "C" fn service_retire(handle: ServiceHandle) -> bool {
    record(&unsafe { service_of(handle) }.calls, "retire");
    true
}

unsafe extern "C" fn service_suspend(handle: ServiceHandle, timeout: *mut timeval) -> bool {
    let service = unsafe { service_of(handle) };
    let timeout = unsafe { &mut *timeout };
    record(
        &service.calls,
        format!("suspend {}s", timeout.tv_sec),
    );
    if timeout.tv_sec > 1 {
        timeout.tv_sec = 1;
        timeout.tv_usec = 0;
    }
    true
}

unsafe extern "C" fn service_resume(handle: ServiceHandle) -> bool {
    record(&unsafe { service_of(handle) }.calls, "resume");
    true
}

unsafe extern "C" fn service_wants_url(
    handle: ServiceHandle,
    url: *const c_char,
    out: *mut bool,
) -> bool {
    let service = unsafe { service_of(handle) };
    let url = unsafe { CStr::from_ptr(url) }.to_string_lossy().into_owned();
    record(&service.calls, format!("wants_url {url}"));
    unsafe { out.write(url.starts_with("http:")) };
    true
}

unsafe extern "C" fn service_make_xaction(
    handle: ServiceHandle,
    host: XactionRef,
    out: *mut XactionHandle,
) -> bool {
    let service = unsafe { service_of(handle) };
    record(&service.calls, "make_xaction");
    let xaction = (service.make)(service, host);
    unsafe { out.write(Box::into_raw(Box::new(xaction)).cast::<c_void>()) };
    true
}

unsafe extern "C" fn service_free(handle: ServiceHandle) {
    let service = unsafe { Box::from_raw(handle.cast::<ForeignService>()) };
    record(&service.calls, "service_free");
}

unsafe extern "C" fn xaction_start(handle: XactionHandle) -> bool {
    let xaction = unsafe { xaction_of(handle) };
    record(&xaction.calls, "xaction_start");
    match xaction.on_start {
        Some(behavior) => behavior(xaction),
        None => true,
    }
}

macro_rules! recorded_entry {
    ($($name:ident => $label:literal),+ $(,)?) => {
        $(
            unsafe extern "C" fn $name(handle: XactionHandle) -> bool {
                record(&unsafe { xaction_of(handle) }.calls, $label);
                true
            }
        )+
    };
}

unsafe extern "C" fn xaction_resume(handle: XactionHandle) -> bool {
    let xaction = unsafe { xaction_of(handle) };
    record(&xaction.calls, "xaction_resume");
    match xaction.on_resume {
        Some(behavior) => behavior(xaction),
        None => true,
    }
}

recorded_entry! {
    xaction_stop => "xaction_stop",
    xaction_ab_discard => "ab_discard",
    xaction_ab_make_more => "ab_make_more",
    xaction_ab_stop_making => "ab_stop_making",
    xaction_ab_pause => "ab_pause",
    xaction_ab_resume => "ab_resume",
}

unsafe extern "C" fn xaction_ab_make(handle: XactionHandle) -> bool {
    let xaction = unsafe { xaction_of(handle) };
    record(&xaction.calls, "ab_make");
    xaction.content = xaction.pending_content.take();
    true
}

unsafe extern "C" fn xaction_ab_content(
    handle: XactionHandle,
    offset: usize,
    size: usize,
    out: *mut RawArea,
) -> bool {
    let xaction = unsafe { xaction_of(handle) };
    record(&xaction.calls, format!("ab_content {offset}+{size}"));
    let Some(content) = &xaction.content else {
        push_foreign_record(false, "no content buffer", Some(("adapter/xaction.rs", 112, 9)));
        return false;
    };
    let start = offset.min(content.len());
    let end = (offset + size).min(content.len());
    let table = gantry::host_table();
    let area = unsafe {
        (table.area.from_bytes)(content[start..end].as_ptr().cast::<c_char>(), end - start)
    };
    unsafe { out.write(area) };
    true
}

unsafe extern "C" fn xaction_ab_content_shift(handle: XactionHandle, size: usize) -> bool {
    let xaction = unsafe { xaction_of(handle) };
    record(&xaction.calls, format!("ab_content_shift {size}"));
    if let Some(content) = &mut xaction.content {
        content.drain(..size.min(content.len()));
    }
    true
}

unsafe extern "C" fn xaction_vb_content_done(handle: XactionHandle, at_end: bool) -> bool {
    let xaction = unsafe { xaction_of(handle) };
    record(&xaction.calls, format!("vb_content_done at_end={at_end}"));
    true
}

unsafe extern "C" fn xaction_vb_content_available(handle: XactionHandle) -> bool {
    let xaction = unsafe { xaction_of(handle) };
    record(&xaction.calls, "vb_content_available");
    // Read whatever virgin content the host has, the way a streaming
    // adapter would.
    let table = gantry::host_table();
    let mut slot = MaybeUninit::<RawArea>::uninit();
    if !unsafe { (table.xaction.vb_content)(xaction.host, 0, 64, slot.as_mut_ptr()) } {
        unsafe { propagate_host_failure() };
        return false;
    }
    let mut area = unsafe { slot.assume_init() };
    if !area.ptr.is_null() {
        let bytes = unsafe {
            std::slice::from_raw_parts(area.ptr.cast::<u8>(), area.len)
        };
        xaction.seen_virgin.lock().unwrap().extend_from_slice(bytes);
    }
    unsafe { (table.area.free)(&raw mut area) };
    true
}

unsafe extern "C" fn xaction_free(handle: XactionHandle) {
    let xaction = unsafe { Box::from_raw(handle.cast::<ForeignXaction>()) };
    record(&xaction.calls, "xaction_free");
}

pub static FOREIGN_TABLE: ForeignTable = ForeignTable {
    service: ServiceTable {
        uri: service_uri,
        tag: service_tag,
        describe: service_describe,
        is_async: service_is_async,
        configure: service_configure,
        reconfigure: service_reconfigure,
        start: service_start,
        stop: service_stop,
        retire: service_retire,
        suspend: service_suspend,
        resume: service_resume,
        wants_url: service_wants_url,
        make_xaction: service_make_xaction,
        free: service_free,
    },
    xaction: XactionTable {
        start: xaction_start,
        stop: xaction_stop,
        resume: xaction_resume,
        ab_discard: xaction_ab_discard,
        ab_make: xaction_ab_make,
        ab_make_more: xaction_ab_make_more,
        ab_stop_making: xaction_ab_stop_making,
        ab_pause: xaction_ab_pause,
        ab_resume: xaction_ab_resume,
        ab_content: xaction_ab_content,
        ab_content_shift: xaction_ab_content_shift,
        vb_content_done: xaction_vb_content_done,
        vb_content_available: xaction_vb_content_available,
        free: xaction_free,
    },
    panic: PanicOps {
        pop: foreign_panic_pop,
        free: foreign_panic_free,
    },
};

/// Boxes a scripted service and wraps it into the host-side adapter.
pub fn register(service: ForeignService) -> gantry::ServiceAdapter {
    ensure_host();
    let handle = Box::into_raw(Box::new(service)).cast::<c_void>();
    unsafe { gantry::ServiceAdapter::from_raw(handle, &FOREIGN_TABLE) }
}

pub fn demo_service(calls: CallLog) -> ForeignService {
    ForeignService {
        uri: "demo-adapter/1.0".to_owned(),
        tag: "demo-1".to_owned(),
        is_async: false,
        calls,
        make: plain_make,
        on_start: None,
        on_resume: None,
    }
}
