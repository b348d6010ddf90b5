//! Builders for raw telemetry datagrams.
//!
//! The builders lay out fields in the same order and widths as the device
//! firmware, so decoder tests can describe a frame by its values instead of
//! by hand-assembled bytes. All integers are little-endian.

/// Length of the NUL-padded version header.
pub const HEADER_LEN: usize = 32;

fn push_header(out: &mut Vec<u8>, header: &str) {
    let mut bytes = header.as_bytes().to_vec();
    bytes.resize(HEADER_LEN, 0);
    out.extend_from_slice(&bytes);
}

fn push_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn push_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

/// GCoMo and down-converter fields shared by both layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IfFields {
    pub agc: bool,
    pub attenuation: u16,
    pub count: u16,
    pub target: u16,
    pub synth_status: u16,
    pub synth_lock: u16,
    pub synth_attenuation: u16,
    pub synth_frequency: u16,
}

impl Default for IfFields {
    fn default() -> Self {
        Self {
            agc: true,
            attenuation: 30,
            count: 32000,
            target: 32000,
            synth_status: 1,
            synth_lock: 1,
            synth_attenuation: 18,
            synth_frequency: 4524,
        }
    }
}

fn push_if_sections(out: &mut Vec<u8>, ifs: &[IfFields; 8]) {
    for f in ifs {
        out.push(u8::from(f.agc));
        out.push(0);
        push_u16(out, f.attenuation);
        push_u16(out, f.count);
        push_u16(out, f.target);
    }
    for f in ifs {
        push_u16(out, f.synth_status);
        push_u16(out, f.synth_lock);
        push_u16(out, f.synth_attenuation);
        push_u16(out, f.synth_frequency);
    }
}

// ---------------------------------------------------------------
// OCT_D layout
// ---------------------------------------------------------------

/// Per-board fields of an OCT_D datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OctBoardFields {
    pub if_fields: IfFields,
    pub sampler_power: [u32; 4],
    pub sampler_offset: [u32; 4],
    pub delay_corr: [u32; 3],
    pub vdif_seconds: u32,
    pub vdif_epoch: u32,
    pub pps_delay: u32,
    pub filter_power: [u32; 2],
    pub filter_stats: [[u32; 4]; 2],
}

impl Default for OctBoardFields {
    fn default() -> Self {
        Self {
            if_fields: IfFields::default(),
            sampler_power: [1000, 1000, 1000, 1000],
            sampler_offset: [512, 512, 512, 512],
            delay_corr: [100, 100, 100],
            vdif_seconds: 3_920_060,
            vdif_epoch: 43,
            pps_delay: 39,
            filter_power: [50_000, 50_000],
            filter_stats: [[16, 34, 34, 16], [16, 34, 34, 16]],
        }
    }
}

/// Builder for OCT_D telemetry datagrams.
#[derive(Debug, Clone)]
pub struct OctFrameBuilder {
    header: String,
    present: u8,
    active: u8,
    boards: [OctBoardFields; 8],
}

impl OctFrameBuilder {
    /// Total length of an OCT_D datagram.
    pub const LEN: usize = HEADER_LEN + 2 + 64 + 64 + 8 * 48 + 8 * 52;

    pub fn new(header: &str) -> Self {
        Self {
            header: header.to_string(),
            present: 0xFF,
            active: 0xFF,
            boards: [OctBoardFields::default(); 8],
        }
    }

    /// Bit `i` marks board `i` as installed.
    pub fn present(mut self, mask: u8) -> Self {
        self.present = mask;
        self
    }

    /// Bit `i` marks board `i` as active.
    pub fn active(mut self, mask: u8) -> Self {
        self.active = mask;
        self
    }

    pub fn board(mut self, index: usize, f: impl FnOnce(&mut OctBoardFields)) -> Self {
        f(&mut self.boards[index]);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::LEN);
        push_header(&mut out, &self.header);
        out.push(self.present);
        out.push(self.active);
        let ifs: [IfFields; 8] = std::array::from_fn(|i| self.boards[i].if_fields);
        push_if_sections(&mut out, &ifs);
        for b in &self.boards {
            b.sampler_power.iter().for_each(|v| push_u32(&mut out, *v));
            b.sampler_offset.iter().for_each(|v| push_u32(&mut out, *v));
            b.delay_corr.iter().for_each(|v| push_u32(&mut out, *v));
            push_u32(&mut out, 0);
        }
        for b in &self.boards {
            push_u32(&mut out, b.vdif_seconds);
            push_u32(&mut out, b.vdif_epoch);
            push_u32(&mut out, b.pps_delay);
            b.filter_power.iter().for_each(|v| push_u32(&mut out, *v));
            for stats in &b.filter_stats {
                stats.iter().for_each(|v| push_u32(&mut out, *v));
            }
        }
        out
    }
}

// ---------------------------------------------------------------
// DDC layout
// ---------------------------------------------------------------

/// Per-board fields of a DDC datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DdcBoardFields {
    pub if_fields: IfFields,
    pub sampler_power: [u32; 4],
    pub sampler_stats: [[u32; 4]; 4],
    pub delay_corr: [u32; 3],
    pub time: u32,
    pub pps_delay: u32,
    pub tp_on: u32,
    pub tp_off: u32,
    pub tsys: u32,
    pub sefd: u32,
}

impl Default for DdcBoardFields {
    fn default() -> Self {
        Self {
            if_fields: IfFields::default(),
            sampler_power: [1000, 1000, 1000, 1000],
            sampler_stats: [[16, 34, 34, 16]; 4],
            delay_corr: [100, 100, 100],
            time: 3_920_060,
            pps_delay: 39,
            tp_on: 1200,
            tp_off: 1100,
            tsys: 50,
            sefd: 1500,
        }
    }
}

/// One 40-byte BBC record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BbcFields {
    /// Frequency in units of 1/524288 MHz.
    pub frequency_raw: u32,
    pub bandwidth: u8,
    pub agc_status: u8,
    pub gain_usb: u8,
    pub gain_lsb: u8,
    pub power_on_usb: u32,
    pub power_on_lsb: u32,
    pub power_off_usb: u32,
    pub power_off_lsb: u32,
    pub stats: [u16; 4],
    pub tsys_usb: u16,
    pub tsys_lsb: u16,
    pub sefd_usb: u16,
    pub sefd_lsb: u16,
}

/// Builder for DDC telemetry datagrams.
#[derive(Debug, Clone)]
pub struct DdcFrameBuilder {
    header: String,
    boards: [DdcBoardFields; 8],
    bbcs: Vec<BbcFields>,
}

impl DdcFrameBuilder {
    /// Total length of a DDC datagram.
    pub const LEN: usize = HEADER_LEN + 64 + 64 + 8 * 92 + 8 * 24 + 128 * 40;

    pub fn new(header: &str) -> Self {
        Self {
            header: header.to_string(),
            boards: [DdcBoardFields::default(); 8],
            bbcs: vec![BbcFields::default(); 128],
        }
    }

    pub fn board(mut self, index: usize, f: impl FnOnce(&mut DdcBoardFields)) -> Self {
        f(&mut self.boards[index]);
        self
    }

    /// Edit BBC record `index` (zero-based, 0..128).
    pub fn bbc(mut self, index: usize, f: impl FnOnce(&mut BbcFields)) -> Self {
        f(&mut self.bbcs[index]);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::LEN);
        push_header(&mut out, &self.header);
        let ifs: [IfFields; 8] = std::array::from_fn(|i| self.boards[i].if_fields);
        push_if_sections(&mut out, &ifs);
        for b in &self.boards {
            b.sampler_power.iter().for_each(|v| push_u32(&mut out, *v));
            for stats in &b.sampler_stats {
                stats.iter().for_each(|v| push_u32(&mut out, *v));
            }
            b.delay_corr.iter().for_each(|v| push_u32(&mut out, *v));
        }
        for b in &self.boards {
            for v in [b.time, b.pps_delay, b.tp_on, b.tp_off, b.tsys, b.sefd] {
                push_u32(&mut out, v);
            }
        }
        for bbc in &self.bbcs {
            push_u32(&mut out, bbc.frequency_raw);
            out.extend_from_slice(&[bbc.bandwidth, bbc.agc_status, bbc.gain_usb, bbc.gain_lsb]);
            for v in [
                bbc.power_on_usb,
                bbc.power_on_lsb,
                bbc.power_off_usb,
                bbc.power_off_lsb,
            ] {
                push_u32(&mut out, v);
            }
            bbc.stats.iter().for_each(|v| push_u16(&mut out, *v));
            for v in [bbc.tsys_usb, bbc.tsys_lsb, bbc.sefd_usb, bbc.sefd_lsb] {
                push_u16(&mut out, v);
            }
        }
        out
    }
}
