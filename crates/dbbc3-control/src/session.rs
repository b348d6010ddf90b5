//! Session -- the command connection to one DBBC3.
//!
//! A [`Session`] owns the transport, the command set resolved for the
//! device's firmware, and the board table. It is created by
//! [`SessionBuilder`](crate::SessionBuilder), which identifies the device
//! before handing out a session, and lives until [`Session::disconnect`].
//!
//! The control software serves one request at a time, so a session allows
//! exactly one outstanding exchange. A second caller does not queue: it
//! fails immediately with [`Error::ConcurrentAccess`].

use std::collections::BTreeMap;
use std::net::SocketAddrV4;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use chrono::NaiveDateTime;
use dbbc3_core::error::{Error, Result};
use dbbc3_core::transport::{ConnectionState, Transport};
use dbbc3_core::{BoardRef, BoardTable, Family, FirmwareInfo};
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};

use crate::commandset::{Args, Call, CommandSet};
use crate::protocol::{self, DecodeResult};
use crate::response::{
    AgcMode, BbcGain, BbcStatistics, CalibrationLoop, Core3Mode, Destination, IfInput, IfSettings,
    InputSource, LevelCount, PhaseCheck, Response, SynthFrequency, TenGbInfo, TimesyncResult,
    TvgMode, VdifFrame, VsiSampleRate,
};

/// Timeouts governing a single exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Wait for the first byte of a response.
    pub read_timeout: Duration,
    /// Quiet interval that ends an unterminated response.
    pub drain_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(5),
            drain_timeout: Duration::from_millis(50),
        }
    }
}

#[derive(Debug)]
struct Status {
    state: ConnectionState,
    last_command: Option<String>,
    last_response: Option<String>,
}

/// An identified command connection to a DBBC3.
pub struct Session {
    transport: Mutex<Box<dyn Transport>>,
    status: StdMutex<Status>,
    command_set: CommandSet,
    firmware: FirmwareInfo,
    boards: BoardTable,
    config: SessionConfig,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("firmware", &self.firmware)
            .field("floor", &self.command_set.floor())
            .field("boards", &self.boards.count())
            .field("state", &self.state())
            .finish()
    }
}

/// Discard whatever is already waiting on the line, e.g. the reply to an
/// earlier command that timed out.
async fn discard_stale(transport: &mut dyn Transport, command: &str) -> Result<()> {
    let mut buf = [0u8; 4096];
    let mut stale = 0usize;
    loop {
        match transport.receive(&mut buf, Duration::ZERO).await {
            Ok(n) => stale += n,
            Err(Error::Timeout) => break,
            Err(e) => return Err(e),
        }
    }
    if stale > 0 {
        debug!(command, bytes = stale, "Discarded stale data before sending");
    }
    Ok(())
}

/// Perform one command/response exchange on `transport`.
///
/// Stale bytes are discarded first so a late reply is never taken for this
/// command's. A response is complete when a NUL arrives, or when data has
/// arrived and the line then stays quiet for `drain_timeout`.
pub(crate) async fn exchange(
    transport: &mut dyn Transport,
    command: &str,
    config: &SessionConfig,
) -> Result<String> {
    discard_stale(transport, command).await?;
    debug!(command, "Sending command");
    transport.send(&protocol::encode_command(command)).await?;

    let mut buf = [0u8; 4096];
    let mut response = Vec::new();
    loop {
        let wait = if response.is_empty() {
            config.read_timeout
        } else {
            config.drain_timeout
        };
        match transport.receive(&mut buf, wait).await {
            Ok(n) => {
                response.extend_from_slice(&buf[..n]);
                if let DecodeResult::Response { text, .. } = protocol::decode_response(&response)? {
                    trace!(command, response = %text, "Terminated response");
                    return Ok(text);
                }
            }
            Err(Error::Timeout) if !response.is_empty() => {
                let text = protocol::decode_unterminated(&response)?;
                trace!(command, response = %text, "Response drained");
                return Ok(text);
            }
            Err(Error::Timeout) => {
                debug!(
                    command,
                    timeout_ms = config.read_timeout.as_millis(),
                    "No response"
                );
                return Err(Error::Timeout);
            }
            Err(e) => return Err(e),
        }
    }
}

impl Session {
    pub(crate) fn new(
        transport: Box<dyn Transport>,
        command_set: CommandSet,
        firmware: FirmwareInfo,
        boards: BoardTable,
        config: SessionConfig,
        identify_response: String,
    ) -> Self {
        Self {
            transport: Mutex::new(transport),
            status: StdMutex::new(Status {
                state: ConnectionState::Connected,
                last_command: Some("version".into()),
                last_response: Some(identify_response),
            }),
            command_set,
            firmware,
            boards,
            config,
        }
    }

    fn with_status<T>(&self, f: impl FnOnce(&mut Status) -> T) -> T {
        let mut status = match self.status.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut status)
    }

    // ---------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------

    pub fn state(&self) -> ConnectionState {
        self.with_status(|s| s.state)
    }

    pub fn firmware(&self) -> &FirmwareInfo {
        &self.firmware
    }

    pub fn command_set(&self) -> &CommandSet {
        &self.command_set
    }

    pub fn family(&self) -> Family {
        self.command_set.family()
    }

    pub fn boards(&self) -> BoardTable {
        self.boards
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Zero-based index of a board given by index or letter.
    pub fn board(&self, board: impl Into<BoardRef>) -> Result<usize> {
        self.boards.resolve(board)
    }

    /// The most recently sent command.
    pub fn last_command(&self) -> Option<String> {
        self.with_status(|s| s.last_command.clone())
    }

    /// The most recently received response.
    pub fn last_response(&self) -> Option<String> {
        self.with_status(|s| s.last_response.clone())
    }

    // ---------------------------------------------------------------
    // Exchanges
    // ---------------------------------------------------------------

    fn acquire(&self) -> Result<tokio::sync::MutexGuard<'_, Box<dyn Transport>>> {
        match self.state() {
            ConnectionState::Connected => {}
            ConnectionState::Faulted => return Err(Error::ConnectionLost),
            _ => return Err(Error::NotConnected),
        }
        self.transport.try_lock().map_err(|_| Error::ConcurrentAccess)
    }

    async fn round_trip(&self, transport: &mut dyn Transport, command: &str) -> Result<String> {
        self.with_status(|s| {
            s.last_command = Some(command.to_string());
            s.last_response = None;
        });
        match exchange(transport, command, &self.config).await {
            Ok(text) => {
                self.with_status(|s| s.last_response = Some(text.clone()));
                Ok(text)
            }
            Err(e) => {
                if e.is_connection() {
                    warn!(command, error = %e, "Connection failed, session faulted");
                    self.with_status(|s| s.state = ConnectionState::Faulted);
                }
                Err(e)
            }
        }
    }

    /// Send a raw command and return the raw response text.
    pub async fn send_command(&self, command: &str) -> Result<String> {
        let mut transport = self.acquire()?;
        self.round_trip(transport.as_mut(), command).await
    }

    /// Run a named command of the active command set.
    ///
    /// All exchanges of a multi-exchange command run under one acquisition
    /// of the session, so no other command can interleave.
    pub async fn execute(&self, name: &str, args: Args) -> Result<Response> {
        let spec = *self.command_set.get(name)?;
        let call = Call::new(args, self.boards)?;
        let commands = (spec.encode)(&call)?;

        let mut transport = self.acquire()?;
        let mut replies = Vec::with_capacity(commands.len());
        for command in &commands {
            replies.push(self.round_trip(transport.as_mut(), command).await?);
        }
        drop(transport);

        (spec.decode)(&call, &replies)
    }

    /// Close the connection. Calling this more than once is not an error.
    pub async fn disconnect(&self) -> Result<()> {
        if self.state() == ConnectionState::Disconnected {
            return Ok(());
        }
        let mut transport = self.transport.lock().await;
        let result = transport.close().await;
        self.with_status(|s| s.state = ConnectionState::Disconnected);
        info!(firmware = %self.firmware, "Session disconnected");
        result
    }

    async fn typed<T>(
        &self,
        name: &str,
        args: Args,
        pick: fn(Response) -> std::result::Result<T, Response>,
    ) -> Result<T> {
        pick(self.execute(name, args).await?).map_err(|other| {
            Error::parse(
                format!("command {name} decoded to an unexpected value"),
                format!("{other:?}"),
            )
        })
    }

    async fn text(&self, name: &str, args: Args) -> Result<String> {
        self.typed(name, args, |r| match r {
            Response::Text(s) => Ok(s),
            other => Err(other),
        })
        .await
    }

    async fn flag(&self, name: &str, args: Args) -> Result<bool> {
        self.typed(name, args, |r| match r {
            Response::Flag(b) => Ok(b),
            other => Err(other),
        })
        .await
    }

    async fn sampler_values(&self, name: &str, args: Args) -> Result<Option<[u64; 4]>> {
        self.typed(name, args, |r| match r {
            Response::SamplerValues(v) => Ok(v),
            other => Err(other),
        })
        .await
    }

    async fn switch(&self, name: &str, args: Args) -> Result<Option<bool>> {
        self.typed(name, args, |r| match r {
            Response::Switch(s) => Ok(s),
            other => Err(other),
        })
        .await
    }

    async fn register(&self, name: &str, args: Args) -> Result<u32> {
        self.typed(name, args, |r| match r {
            Response::Register(v) => Ok(v),
            other => Err(other),
        })
        .await
    }

    async fn correlation(&self, name: &str, args: Args) -> Result<[i64; 3]> {
        self.typed(name, args, |r| match r {
            Response::Correlation(c) => Ok(c),
            other => Err(other),
        })
        .await
    }

    async fn pps_delays(&self, args: Args) -> Result<Vec<u32>> {
        self.typed("pps_delay", args, |r| match r {
            Response::PpsDelays(d) => Ok(d),
            other => Err(other),
        })
        .await
    }

    // ---------------------------------------------------------------
    // General commands
    // ---------------------------------------------------------------

    /// Query the firmware version again.
    pub async fn version(&self) -> Result<FirmwareInfo> {
        self.typed("version", Args::none(), |r| match r {
            Response::Firmware(f) => Ok(f),
            other => Err(other),
        })
        .await
    }

    /// Time information of all boards, as reported.
    pub async fn time(&self) -> Result<String> {
        self.text("time", Args::none()).await
    }

    /// Current GCoMo settings of a board.
    pub async fn dbbcif(&self, board: impl Into<BoardRef>) -> Result<IfSettings> {
        self.typed("dbbcif", Args::for_board(board), |r| match r {
            Response::If(s) => Ok(s),
            other => Err(other),
        })
        .await
    }

    /// Configure the GCoMo of a board; returns the settings now in effect.
    pub async fn set_dbbcif(
        &self,
        board: impl Into<BoardRef>,
        input: IfInput,
        mode: AgcMode,
        target: Option<u32>,
    ) -> Result<IfSettings> {
        let mut args = Args::for_board(board)
            .int(i64::from(input.code()))
            .text(mode.to_string());
        if let Some(target) = target {
            args = args.int(i64::from(target));
        }
        self.typed("dbbcif", args, |r| match r {
            Response::If(s) => Ok(s),
            other => Err(other),
        })
        .await
    }

    /// Reload the firmware, reinitialize the samplers and core boards and
    /// resynchronize to the PPS.
    pub async fn reconfigure(&self) -> Result<String> {
        self.text("reconfigure", Args::none()).await
    }

    /// Whether all samplers of all boards are in phase. The report names
    /// the failing boards.
    pub async fn checkphase(&self) -> Result<PhaseCheck> {
        self.typed("checkphase", Args::none(), |r| match r {
            Response::Phase(p) => Ok(p),
            other => Err(other),
        })
        .await
    }

    pub async fn synth_lock(&self, board: impl Into<BoardRef>) -> Result<bool> {
        self.flag("synth_lock", Args::for_board(board)).await
    }

    pub async fn synth_freq(&self, board: impl Into<BoardRef>) -> Result<SynthFrequency> {
        self.typed("synth_freq", Args::for_board(board), |r| match r {
            Response::SynthFrequency(f) => Ok(f),
            other => Err(other),
        })
        .await
    }

    pub async fn enableloop(&self) -> Result<String> {
        self.text("enableloop", Args::none()).await
    }

    pub async fn disableloop(&self) -> Result<String> {
        self.text("disableloop", Args::none()).await
    }

    /// Select the calibrations run by the calibration loop. Fails with a
    /// parse error if the device reports different settings.
    pub async fn enablecal(&self, settings: CalibrationLoop) -> Result<CalibrationLoop> {
        let args = Args::none()
            .flag(settings.threshold)
            .flag(settings.gain)
            .flag(settings.offset);
        self.typed("enablecal", args, |r| match r {
            Response::Calibration(c) => Ok(c),
            other => Err(other),
        })
        .await
    }

    // ---------------------------------------------------------------
    // core3h commands
    // ---------------------------------------------------------------

    pub async fn core3h_version(&self, board: impl Into<BoardRef>) -> Result<String> {
        self.text("core3h_version", Args::for_board(board)).await
    }

    pub async fn core3h_sysstat(&self, board: impl Into<BoardRef>) -> Result<String> {
        self.text("core3h_sysstat", Args::for_board(board)).await
    }

    /// VDIF time of the active 1PPS source, `None` if none was reported.
    pub async fn core3h_time(&self, board: impl Into<BoardRef>) -> Result<Option<NaiveDateTime>> {
        self.typed("core3h_time", Args::for_board(board), |r| match r {
            Response::Timestamp(t) => Ok(t),
            other => Err(other),
        })
        .await
    }

    pub async fn core3h_timesync(&self, board: impl Into<BoardRef>) -> Result<TimesyncResult> {
        self.typed("core3h_timesync", Args::for_board(board), |r| match r {
            Response::Timesync(t) => Ok(t),
            other => Err(other),
        })
        .await
    }

    /// Reset the data path. With `keepsync` the timers are kept running.
    pub async fn core3h_reset(&self, board: impl Into<BoardRef>, keepsync: bool) -> Result<bool> {
        self.flag("core3h_reset", Args::for_board(board).flag(keepsync))
            .await
    }

    pub async fn core3h_reboot(&self, board: impl Into<BoardRef>) -> Result<bool> {
        self.flag("core3h_reboot", Args::for_board(board)).await
    }

    /// Start output in `format` (`vdif`, `raw`, or per-output formats
    /// joined by `+`). Returns the format selected for each output.
    pub async fn core3h_start(
        &self,
        board: impl Into<BoardRef>,
        format: &str,
        force: bool,
    ) -> Result<Vec<Option<String>>> {
        let args = Args::for_board(board).text(format).flag(force);
        self.typed("core3h_start", args, |r| match r {
            Response::OutputFormats(f) => Ok(f),
            other => Err(other),
        })
        .await
    }

    pub async fn core3h_stop(&self, board: impl Into<BoardRef>) -> Result<bool> {
        self.flag("core3h_stop", Args::for_board(board)).await
    }

    /// Power of the four samplers, `None` if the board is not connected.
    pub async fn core3_power(&self, board: impl Into<BoardRef>) -> Result<Option<[u64; 4]>> {
        self.sampler_values("core3h_core3_power", Args::for_board(board))
            .await
    }

    /// Counts of the four 2-bit levels (11, 10, 01, 00) of one sampler.
    pub async fn core3_bstat(
        &self,
        board: impl Into<BoardRef>,
        sampler: usize,
    ) -> Result<Option<[u64; 4]>> {
        let args = Args::for_board(board).int(sampler as i64);
        self.sampler_values("core3h_core3_bstat", args).await
    }

    pub async fn core3_corr(&self, board: impl Into<BoardRef>) -> Result<[i64; 3]> {
        self.correlation("core3h_core3_corr", Args::for_board(board))
            .await
    }

    // ---------------------------------------------------------------
    // core3h configuration
    // ---------------------------------------------------------------

    /// Read a register of a formatter device (see
    /// [`core3h_devices`](Self::core3h_devices)); `core3` when `device` is
    /// `None`.
    pub async fn core3h_regread(
        &self,
        board: impl Into<BoardRef>,
        register: u32,
        device: Option<&str>,
    ) -> Result<u32> {
        let mut args = Args::for_board(board).int(i64::from(register));
        if let Some(device) = device {
            args = args.text(device);
        }
        self.register("core3h_regread", args).await
    }

    /// As [`core3h_regread`](Self::core3h_regread), from the decimal form.
    pub async fn core3h_regread_dec(
        &self,
        board: impl Into<BoardRef>,
        register: u32,
        device: Option<&str>,
    ) -> Result<u32> {
        let mut args = Args::for_board(board).int(i64::from(register));
        if let Some(device) = device {
            args = args.text(device);
        }
        self.register("core3h_regread_dec", args).await
    }

    /// Write a device register. Returns whether the value changed.
    pub async fn core3h_regwrite(
        &self,
        board: impl Into<BoardRef>,
        device: &str,
        register: u32,
        value: u32,
    ) -> Result<bool> {
        let args = Args::for_board(board)
            .text(device)
            .int(i64::from(register))
            .int(i64::from(value));
        self.flag("core3h_regwrite", args).await
    }

    /// Write the bits of `value` selected by `mask`. Returns whether the
    /// register changed.
    pub async fn core3h_regupdate(
        &self,
        board: impl Into<BoardRef>,
        device: &str,
        register: u32,
        value: u32,
        mask: u32,
    ) -> Result<bool> {
        let args = Args::for_board(board)
            .text(device)
            .int(i64::from(register))
            .int(i64::from(value))
            .int(i64::from(mask));
        self.flag("core3h_regupdate", args).await
    }

    /// Device names and their address ranges.
    pub async fn core3h_devices(
        &self,
        board: impl Into<BoardRef>,
    ) -> Result<BTreeMap<String, String>> {
        self.typed("core3h_devices", Args::for_board(board), |r| match r {
            Response::Devices(d) => Ok(d),
            other => Err(other),
        })
        .await
    }

    async fn sample_rate(&self, args: Args) -> Result<VsiSampleRate> {
        self.typed("core3h_vsi_samplerate", args, |r| match r {
            Response::SampleRate(s) => Ok(s),
            other => Err(other),
        })
        .await
    }

    pub async fn core3h_vsi_samplerate(&self, board: impl Into<BoardRef>) -> Result<VsiSampleRate> {
        self.sample_rate(Args::for_board(board)).await
    }

    /// Set the VSI input rate in samples per second, decimated by
    /// `decimation` (1-255).
    pub async fn set_core3h_vsi_samplerate(
        &self,
        board: impl Into<BoardRef>,
        sample_rate: u64,
        decimation: u8,
    ) -> Result<VsiSampleRate> {
        let rate = i64::try_from(sample_rate)
            .map_err(|_| Error::InvalidParameter(format!("sample rate {sample_rate} too large")))?;
        let args = Args::for_board(board).int(rate).int(i64::from(decimation));
        self.sample_rate(args).await
    }

    /// One bitmask per VSI input.
    pub async fn core3h_vsi_bitmask(&self, board: impl Into<BoardRef>) -> Result<Vec<u64>> {
        self.typed("core3h_vsi_bitmask", Args::for_board(board), |r| match r {
            Response::Values(v) => Ok(v),
            other => Err(other),
        })
        .await
    }

    /// Swap two VSI inputs, or restore the default order with `None`.
    pub async fn core3h_vsi_swap(
        &self,
        board: impl Into<BoardRef>,
        swap: Option<(u8, u8)>,
    ) -> Result<String> {
        let args = match swap {
            Some((first, second)) => Args::for_board(board)
                .int(i64::from(first))
                .int(i64::from(second)),
            None => Args::for_board(board).text("reset"),
        };
        self.text("core3h_vsi_swap", args).await
    }

    /// Select the input source. This also resets the VSI bitmask, the
    /// input width and the VSI swap.
    pub async fn core3h_inputselect(
        &self,
        board: impl Into<BoardRef>,
        source: InputSource,
    ) -> Result<InputSource> {
        let args = Args::for_board(board).text(source.to_string());
        self.typed("core3h_inputselect", args, |r| match r {
            Response::Input(s) => Ok(s),
            other => Err(other),
        })
        .await
    }

    /// Split the input into two streams. `None` when the reply did not
    /// state the mode.
    pub async fn core3h_splitmode(
        &self,
        board: impl Into<BoardRef>,
        on: bool,
    ) -> Result<Option<bool>> {
        self.switch("core3h_splitmode", Args::for_board(board).flag(on))
            .await
    }

    /// Query the test vector generator, or select `mode`.
    pub async fn core3h_tvg_mode(
        &self,
        board: impl Into<BoardRef>,
        mode: Option<TvgMode>,
    ) -> Result<Option<TvgMode>> {
        let mut args = Args::for_board(board);
        if let Some(mode) = mode {
            args = args.text(mode.to_string());
        }
        self.typed("core3h_tvg_mode", args, |r| match r {
            Response::Tvg(m) => Ok(m),
            other => Err(other),
        })
        .await
    }

    async fn vdif_frame(&self, args: Args) -> Result<Option<VdifFrame>> {
        self.typed("core3h_vdif_frame", args, |r| match r {
            Response::VdifFrame(f) => Ok(f),
            other => Err(other),
        })
        .await
    }

    /// Current VDIF frame layout, `None` if the device reported a failure.
    pub async fn core3h_vdif_frame(&self, board: impl Into<BoardRef>) -> Result<Option<VdifFrame>> {
        self.vdif_frame(Args::for_board(board)).await
    }

    /// Set the VDIF frame layout. Returns `None` if the layout is not
    /// supported, in which case the previous one stays in effect.
    pub async fn set_core3h_vdif_frame(
        &self,
        board: impl Into<BoardRef>,
        channel_width: u32,
        channels: u32,
        payload_size: Option<u32>,
    ) -> Result<Option<VdifFrame>> {
        let mut args = Args::for_board(board)
            .int(i64::from(channel_width))
            .int(i64::from(channels));
        if let Some(size) = payload_size {
            args = args.int(i64::from(size));
        }
        self.vdif_frame(args).await
    }

    /// Query the VDIF station code, or set a one or two letter code.
    pub async fn core3h_vdif_station(
        &self,
        board: impl Into<BoardRef>,
        station: Option<&str>,
    ) -> Result<String> {
        let mut args = Args::for_board(board);
        if let Some(station) = station {
            args = args.text(station);
        }
        self.text("core3h_vdif_station", args).await
    }

    pub async fn core3h_vdif_enc(&self, board: impl Into<BoardRef>) -> Result<Option<bool>> {
        self.switch("core3h_vdif_enc", Args::for_board(board)).await
    }

    async fn userdata(&self, args: Args) -> Result<[u32; 4]> {
        self.typed("core3h_vdif_userdata", args, |r| match r {
            Response::UserData(d) => Ok(d),
            other => Err(other),
        })
        .await
    }

    /// The user data words of the extended VDIF header. Bits 24-31 of the
    /// first word hold the extended data version.
    pub async fn core3h_vdif_userdata(&self, board: impl Into<BoardRef>) -> Result<[u32; 4]> {
        self.userdata(Args::for_board(board)).await
    }

    /// Replace the words given as `Some`, keeping the others, and return
    /// what the device now holds.
    pub async fn set_core3h_vdif_userdata(
        &self,
        board: impl Into<BoardRef>,
        words: [Option<u32>; 4],
    ) -> Result<[u32; 4]> {
        let board = board.into();
        let current = self.userdata(Args::for_board(board)).await?;
        let args = words
            .iter()
            .zip(current)
            .fold(Args::for_board(board), |args, (new, old)| {
                args.int(i64::from(new.unwrap_or(old)))
            });
        self.userdata(args).await
    }

    async fn destination(&self, args: Args) -> Result<Destination> {
        self.typed("core3h_destination", args, |r| match r {
            Response::Destination(d) => Ok(d),
            other => Err(other),
        })
        .await
    }

    pub async fn core3h_destination(
        &self,
        board: impl Into<BoardRef>,
        output: u32,
    ) -> Result<Destination> {
        self.destination(Args::for_board(board).int(i64::from(output)))
            .await
    }

    /// Send `output` (or only its `thread`) to `address`, or stop sending
    /// with `None`. Returns the destination now in effect.
    pub async fn set_core3h_destination(
        &self,
        board: impl Into<BoardRef>,
        output: u32,
        address: Option<SocketAddrV4>,
        thread: Option<u16>,
    ) -> Result<Destination> {
        let mut args = Args::for_board(board).int(i64::from(output));
        args = match address {
            Some(addr) => args.text(addr.ip().to_string()).int(i64::from(addr.port())),
            None => args.text("none").int(0),
        };
        if let Some(thread) = thread {
            args = args.int(i64::from(thread));
        }
        self.destination(args).await
    }

    /// Settings and ARP cache of a 10GbE device, e.g. `eth0`.
    pub async fn core3h_tengbinfo(
        &self,
        board: impl Into<BoardRef>,
        device: &str,
    ) -> Result<TenGbInfo> {
        self.typed("core3h_tengbinfo", Args::for_board(board).text(device), |r| {
            match r {
                Response::TenGbInfo(i) => Ok(i),
                other => Err(other),
            }
        })
        .await
    }

    /// Set one 10GbE parameter: `ip`, `mac`, `nm`, `port` or `gateway`.
    pub async fn core3h_tengbcfg(
        &self,
        board: impl Into<BoardRef>,
        device: &str,
        key: &str,
        value: &str,
    ) -> Result<String> {
        let args = Args::for_board(board).text(device).text(key).text(value);
        self.text("core3h_tengbcfg", args).await
    }

    /// Set ARP entry `id` of a 10GbE device.
    pub async fn core3h_tengbarp(
        &self,
        board: impl Into<BoardRef>,
        device: &str,
        id: u8,
        mac: &str,
    ) -> Result<String> {
        let args = Args::for_board(board)
            .text(device)
            .int(i64::from(id))
            .text(mac);
        self.text("core3h_tengbarp", args).await
    }

    /// Query ARP requests on all ethernet cores, or switch them.
    pub async fn core3h_arp(
        &self,
        board: impl Into<BoardRef>,
        on: Option<bool>,
    ) -> Result<Option<bool>> {
        let mut args = Args::for_board(board);
        if let Some(on) = on {
            args = args.flag(on);
        }
        self.switch("core3h_arp", args).await
    }

    /// Debug dump of the first words of a frame sent at `output`.
    pub async fn core3h_output(
        &self,
        board: impl Into<BoardRef>,
        output: u32,
        frame: u32,
    ) -> Result<String> {
        let args = Args::for_board(board)
            .int(i64::from(output))
            .int(i64::from(frame));
        self.text("core3h_output", args).await
    }

    /// Initialize the board from the control file.
    pub async fn core3h_core3_init(&self, board: impl Into<BoardRef>) -> Result<bool> {
        self.flag("core3h_core3_init", Args::for_board(board)).await
    }

    /// Query how sampler data is routed to the outputs, or select `mode`.
    pub async fn core3h_core3_mode(
        &self,
        board: impl Into<BoardRef>,
        mode: Option<Core3Mode>,
    ) -> Result<Option<Core3Mode>> {
        let mut args = Args::for_board(board);
        if let Some(mode) = mode {
            args = args.text(mode.to_string());
        }
        self.typed("core3h_core3_mode", args, |r| match r {
            Response::Core3Mode(m) => Ok(m),
            other => Err(other),
        })
        .await
    }

    pub async fn core3h_sysstat_fs(&self, board: impl Into<BoardRef>) -> Result<String> {
        self.text("core3h_sysstat_fs", Args::for_board(board)).await
    }

    pub async fn core3h_mode_fs(&self, board: impl Into<BoardRef>) -> Result<String> {
        self.text("core3h_mode_fs", Args::for_board(board)).await
    }

    pub async fn core3h_status_fs(&self, board: impl Into<BoardRef>) -> Result<String> {
        self.text("core3h_status_fs", Args::for_board(board)).await
    }

    // ---------------------------------------------------------------
    // ADB3L samplers
    // ---------------------------------------------------------------

    /// Reset all samplers of all boards. With `keep_trims` the delay,
    /// offset and gain trims are kept.
    pub async fn adb3l_reset(&self, keep_trims: bool) -> Result<String> {
        let name = if keep_trims { "adb3l_reseth" } else { "adb3l_reset" };
        self.text(name, Args::none()).await
    }

    /// Reset one sampler of a board, or all of them.
    pub async fn adb3l_resets(
        &self,
        board: impl Into<BoardRef>,
        sampler: Option<usize>,
    ) -> Result<String> {
        let mut args = Args::for_board(board);
        if let Some(sampler) = sampler {
            args = args.int(sampler as i64);
        }
        self.text("adb3l_resets", args).await
    }

    /// Switch the built-in self test of a board's samplers.
    pub async fn adb3l_bist(&self, board: impl Into<BoardRef>, on: bool) -> Result<String> {
        let name = if on { "adb3l_biston" } else { "adb3l_bistoff" };
        self.text(name, Args::for_board(board)).await
    }

    pub async fn adb3l_sda_on(&self, board: impl Into<BoardRef>, sampler: usize) -> Result<String> {
        self.text("adb3l_sda_on", Args::for_board(board).int(sampler as i64))
            .await
    }

    async fn adb3l_trim(
        &self,
        name: &str,
        board: impl Into<BoardRef>,
        sampler: usize,
        value: Option<u16>,
    ) -> Result<String> {
        let mut args = Args::for_board(board).int(sampler as i64);
        if let Some(value) = value {
            args = args.int(i64::from(value));
        }
        self.text(name, args).await
    }

    /// Sampler delay trim (0-1023); `None` restores 512.
    pub async fn adb3l_delay(
        &self,
        board: impl Into<BoardRef>,
        sampler: usize,
        value: Option<u16>,
    ) -> Result<String> {
        self.adb3l_trim("adb3l_delay", board, sampler, value).await
    }

    /// Sampler offset trim (0-255); `None` restores 128.
    pub async fn adb3l_offset(
        &self,
        board: impl Into<BoardRef>,
        sampler: usize,
        value: Option<u16>,
    ) -> Result<String> {
        self.adb3l_trim("adb3l_offset", board, sampler, value).await
    }

    /// Sampler gain trim (0-255); `None` restores 128.
    pub async fn adb3l_gain(
        &self,
        board: impl Into<BoardRef>,
        sampler: usize,
        value: Option<u16>,
    ) -> Result<String> {
        self.adb3l_trim("adb3l_gain", board, sampler, value).await
    }

    // ---------------------------------------------------------------
    // DDC commands
    // ---------------------------------------------------------------

    /// Current settings of a BBC (1-128).
    pub async fn dbbc(&self, bbc: u32) -> Result<String> {
        self.text("dbbc", Args::none().int(i64::from(bbc))).await
    }

    /// Tune a BBC to `freq_mhz` on IF `label`.
    pub async fn set_dbbc(
        &self,
        bbc: u32,
        freq_mhz: f64,
        label: char,
        tpint: Option<u32>,
    ) -> Result<String> {
        let mut args = Args::none()
            .int(i64::from(bbc))
            .float(freq_mhz)
            .text(label.to_string());
        if let Some(tpint) = tpint {
            args = args.int(i64::from(tpint));
        }
        self.text("dbbc", args).await
    }

    async fn bbc_gain(&self, args: Args) -> Result<BbcGain> {
        self.typed("dbbcgain", args, |r| match r {
            Response::BbcGain(g) => Ok(g),
            other => Err(other),
        })
        .await
    }

    pub async fn dbbcgain(&self, bbc: u32) -> Result<BbcGain> {
        self.bbc_gain(Args::none().int(i64::from(bbc))).await
    }

    /// Switch a BBC to automatic gain control, optionally with a new target.
    pub async fn dbbcgain_agc(&self, bbc: u32, target: Option<u32>) -> Result<BbcGain> {
        let mut args = Args::none().int(i64::from(bbc)).text("agc");
        if let Some(target) = target {
            args = args.int(i64::from(target));
        }
        self.bbc_gain(args).await
    }

    /// Freeze the gains of a BBC, or set them explicitly.
    pub async fn dbbcgain_manual(
        &self,
        bbc: u32,
        usb: Option<u32>,
        lsb: Option<u32>,
    ) -> Result<BbcGain> {
        let mut args = Args::none().int(i64::from(bbc)).text("man");
        if let Some(usb) = usb {
            args = args.int(i64::from(usb));
            if let Some(lsb) = lsb {
                args = args.int(i64::from(lsb));
            }
        }
        self.bbc_gain(args).await
    }

    pub async fn dbbcstat(&self, bbc: u32) -> Result<BbcStatistics> {
        self.typed("dbbcstat", Args::none().int(i64::from(bbc)), |r| match r {
            Response::BbcStatistics(s) => Ok(s),
            other => Err(other),
        })
        .await
    }

    pub async fn dbbctp(&self, board: impl Into<BoardRef>) -> Result<String> {
        self.text("dbbctp", Args::for_board(board)).await
    }

    pub async fn cont_cal(&self, on: bool) -> Result<String> {
        self.text("cont_cal", Args::none().flag(on)).await
    }

    pub async fn dsc_tp(&self, board: impl Into<BoardRef>) -> Result<Vec<u64>> {
        self.typed("dsc_tp", Args::for_board(board), |r| match r {
            Response::Values(v) => Ok(v),
            other => Err(other),
        })
        .await
    }

    pub async fn dsc_corr(&self, board: impl Into<BoardRef>) -> Result<[i64; 3]> {
        self.correlation("dsc_corr", Args::for_board(board)).await
    }

    pub async fn dsc_bstat(
        &self,
        board: impl Into<BoardRef>,
        sampler: usize,
    ) -> Result<[LevelCount; 4]> {
        let args = Args::for_board(board).int(sampler as i64);
        self.typed("dsc_bstat", args, |r| match r {
            Response::LevelCounts(l) => Ok(l),
            other => Err(other),
        })
        .await
    }

    pub async fn mag_thr(&self, bbc: u32, value: i64) -> Result<String> {
        self.text("mag_thr", Args::none().int(i64::from(bbc)).int(value))
            .await
    }

    /// PPS delay of every board in nanoseconds.
    pub async fn pps_delay(&self) -> Result<Vec<u32>> {
        self.pps_delays(Args::none()).await
    }

    /// PPS delays of the BBC blocks of one board (DDC_V 124 and later).
    pub async fn pps_delay_blocks(&self, board: impl Into<BoardRef>) -> Result<Vec<u32>> {
        self.pps_delays(Args::for_board(board)).await
    }

    /// Read a core3h register (expert use).
    pub async fn core3hread(
        &self,
        board: impl Into<BoardRef>,
        block: u32,
        bbc: u32,
        register: u32,
    ) -> Result<u32> {
        let args = Args::for_board(board)
            .int(i64::from(block))
            .int(i64::from(bbc))
            .int(i64::from(register));
        self.typed("core3hread", args, |r| match r {
            Response::Register(v) => Ok(v),
            other => Err(other),
        })
        .await
    }

    /// Write a core3h register (expert use).
    pub async fn core3hwrite(
        &self,
        board: impl Into<BoardRef>,
        block: u32,
        bbc: u32,
        register: u32,
        value: u32,
    ) -> Result<String> {
        let args = Args::for_board(board)
            .int(i64::from(block))
            .int(i64::from(bbc))
            .int(i64::from(register))
            .int(i64::from(value));
        self.text("core3hwrite", args).await
    }

    // ---------------------------------------------------------------
    // OCT commands
    // ---------------------------------------------------------------

    /// Load a polyphase filter file into the first filter stage.
    pub async fn tap(
        &self,
        board: impl Into<BoardRef>,
        filter: &str,
        scaling: u32,
    ) -> Result<String> {
        let args = Args::for_board(board).text(filter).int(i64::from(scaling));
        self.text("tap", args).await
    }

    pub async fn tap2(
        &self,
        board: impl Into<BoardRef>,
        filter: &str,
        scaling: u32,
    ) -> Result<String> {
        let args = Args::for_board(board).text(filter).int(i64::from(scaling));
        self.text("tap2", args).await
    }
}
