use super::convert::{ColorConverter, ConvertedFrameBuffer, PRESENTATION_FORMAT};
use super::decoder::DecodeEngine;
use super::hardware::{accelerator_pixel_format, available_device_types, device_type_by_name};
use super::negotiate::{negotiate_hw_format, FormatNegotiator};
use super::pipeline::{Pipeline, PresentationStage};
use super::present::{Pacer, PresentationSurface, Presenter};
use super::pump::{FramePump, FrameStage, PumpState};
use super::types::{Frame, PlaneRef, PumpStats, Retrieval, Submission};
use ffmpeg_next::ffi::{AVHWDeviceType, AVPixelFormat};
use ffmpeg_next::format::Pixel;
use ffmpeg_next::{codec, frame};
use playback_types::{PlaybackError, PlaybackErrorKind};
use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

const ACCELERATOR: Pixel = Pixel::CUDA;

struct FakeFrame {
    id: u32,
    format: Pixel,
    live: Rc<Cell<i64>>,
}

impl FakeFrame {
    fn new(id: u32, format: Pixel, live: &Rc<Cell<i64>>) -> Self {
        live.set(live.get() + 1);
        Self {
            id,
            format,
            live: live.clone(),
        }
    }
}

impl Drop for FakeFrame {
    fn drop(&mut self) {
        self.live.set(self.live.get() - 1);
    }
}

impl Frame for FakeFrame {
    fn pixel_format(&self) -> Pixel {
        self.format
    }

    fn width(&self) -> u32 {
        16
    }

    fn height(&self) -> u32 {
        16
    }
}

struct FakePacket(Vec<(u32, Pixel)>);

/// Decoder double that emits scripted frames and keeps the last
/// `hold_back` of them until it is flushed.
#[derive(Default)]
struct ScriptedEngine {
    live: Rc<Cell<i64>>,
    buffered: VecDeque<FakeFrame>,
    hold_back: usize,
    flushed: bool,
    submissions: usize,
    returned: usize,
    transfers: usize,
    fail_submit_on: Option<usize>,
    fail_receive_after: Option<usize>,
    fail_transfer: bool,
}

impl DecodeEngine for ScriptedEngine {
    type Packet = FakePacket;
    type Frame = FakeFrame;

    fn accelerator_format(&self) -> Pixel {
        ACCELERATOR
    }

    fn submit(&mut self, submission: Submission<'_, FakePacket>) -> Result<(), PlaybackError> {
        let n = self.submissions;
        self.submissions += 1;
        if self.fail_submit_on == Some(n) {
            return Err(PlaybackError::new(
                PlaybackErrorKind::DecodeSubmit,
                "invalid data found when processing input",
            ));
        }
        match submission {
            Submission::Packet(packet) => {
                for &(id, format) in &packet.0 {
                    self.buffered.push_back(FakeFrame::new(id, format, &self.live));
                }
            }
            Submission::Flush => self.flushed = true,
        }
        Ok(())
    }

    fn receive(&mut self) -> Result<Retrieval<FakeFrame>, PlaybackError> {
        if self.fail_receive_after == Some(self.returned) {
            return Err(PlaybackError::new(
                PlaybackErrorKind::DecodeReceive,
                "decoder reported a corrupt frame",
            ));
        }
        if self.buffered.len() > self.hold_back || (self.flushed && !self.buffered.is_empty()) {
            if let Some(frame) = self.buffered.pop_front() {
                self.returned += 1;
                return Ok(Retrieval::Frame(frame));
            }
        }
        if self.flushed {
            Ok(Retrieval::EndOfStream)
        } else {
            Ok(Retrieval::NeedsInput)
        }
    }

    fn transfer(&mut self, frame: &FakeFrame) -> Result<FakeFrame, PlaybackError> {
        self.transfers += 1;
        if self.fail_transfer {
            return Err(PlaybackError::new(
                PlaybackErrorKind::FrameTransfer,
                "cannot allocate memory",
            ));
        }
        Ok(FakeFrame::new(frame.id, Pixel::NV12, &self.live))
    }
}

#[derive(Default)]
struct RecordingStage {
    seen: Vec<(u32, Pixel)>,
    live_at_process: Vec<i64>,
    live: Option<Rc<Cell<i64>>>,
    fail_on: Option<usize>,
    stop_after: Option<usize>,
}

impl FrameStage<FakeFrame> for RecordingStage {
    fn process(&mut self, frame: &FakeFrame) -> Result<(), PlaybackError> {
        if self.fail_on == Some(self.seen.len()) {
            return Err(PlaybackError::new(
                PlaybackErrorKind::Conversion,
                "unsupported input",
            ));
        }
        if let Some(live) = &self.live {
            self.live_at_process.push(live.get());
        }
        self.seen.push((frame.id, frame.format));
        Ok(())
    }

    fn should_stop(&mut self) -> bool {
        self.stop_after.is_some_and(|n| self.seen.len() >= n)
    }
}

fn packet(frames: &[(u32, Pixel)]) -> FakePacket {
    FakePacket(frames.to_vec())
}

fn device_packets(count: u32) -> Vec<FakePacket> {
    (0..count).map(|id| packet(&[(id, ACCELERATOR)])).collect()
}

#[test]
fn negotiator_picks_accelerator_wherever_it_is_offered() {
    let negotiator = FormatNegotiator::new(ACCELERATOR);
    let offers: [&[Pixel]; 3] = [
        &[Pixel::CUDA, Pixel::YUV420P],
        &[Pixel::YUV420P, Pixel::CUDA, Pixel::NV12],
        &[Pixel::NV12, Pixel::YUV420P, Pixel::CUDA],
    ];
    for offered in offers {
        assert_eq!(negotiator.select(offered).unwrap(), ACCELERATOR);
    }
    assert!(!negotiator.was_rejected());
}

#[test]
fn negotiator_rejects_software_only_offers() {
    let negotiator = FormatNegotiator::new(ACCELERATOR);
    for offered in [&[Pixel::YUV420P, Pixel::NV12][..], &[][..]] {
        let err = negotiator.select(offered).unwrap_err();
        assert_eq!(err.kind, PlaybackErrorKind::FormatNegotiation);
    }
}

#[test]
fn get_format_callback_records_rejection_and_recovers() {
    let negotiator = FormatNegotiator::new(ACCELERATOR);
    let mut context = codec::Context::new();
    unsafe { negotiator.install(&mut context) };

    let software = [
        AVPixelFormat::AV_PIX_FMT_YUV420P,
        AVPixelFormat::AV_PIX_FMT_NV12,
        AVPixelFormat::AV_PIX_FMT_NONE,
    ];
    let chosen = unsafe { negotiate_hw_format(context.as_mut_ptr(), software.as_ptr()) };
    assert_eq!(chosen, AVPixelFormat::AV_PIX_FMT_NONE);
    assert!(negotiator.was_rejected());

    // Renegotiation is answered again, with the same choice every time.
    let with_device = [
        AVPixelFormat::AV_PIX_FMT_NV12,
        AVPixelFormat::AV_PIX_FMT_CUDA,
        AVPixelFormat::AV_PIX_FMT_NONE,
    ];
    for _ in 0..2 {
        let chosen = unsafe { negotiate_hw_format(context.as_mut_ptr(), with_device.as_ptr()) };
        assert_eq!(chosen, AVPixelFormat::AV_PIX_FMT_CUDA);
    }
}

#[test]
fn decoder_without_device_config_is_unsupported_hardware() {
    let png = codec::decoder::find(codec::Id::PNG).unwrap();

    let err = accelerator_pixel_format(&png, AVHWDeviceType::AV_HWDEVICE_TYPE_CUDA).unwrap_err();

    assert_eq!(err.kind, PlaybackErrorKind::UnsupportedHardware);
    assert_eq!(err.exit_code(), 4);
    assert!(err.message.as_str().contains("png"), "{}", err);
    assert!(err.message.as_str().contains("cuda"), "{}", err);
}

#[test]
fn transfers_only_frames_in_accelerator_format() {
    let engine = ScriptedEngine::default();
    let mut pump = FramePump::new(engine, RecordingStage::default());

    pump.pump(Submission::Packet(&packet(&[
        (0, ACCELERATOR),
        (1, Pixel::NV12),
        (2, ACCELERATOR),
    ])))
    .unwrap();

    assert_eq!(pump.engine().transfers, 2);
    assert_eq!(
        pump.stage().seen,
        vec![(0, Pixel::NV12), (1, Pixel::NV12), (2, Pixel::NV12)]
    );
    assert_eq!(
        pump.stats(),
        PumpStats {
            packets_submitted: 1,
            frames_received: 3,
            frames_transferred: 2,
            frames_presented: 3,
            cancelled: false,
        }
    );
    assert_eq!(pump.state(), PumpState::Idle);
}

#[test]
fn device_frame_is_released_before_the_host_copy_is_processed() {
    let engine = ScriptedEngine::default();
    let live = engine.live.clone();
    let stage = RecordingStage {
        live: Some(live.clone()),
        ..Default::default()
    };
    let mut pump = FramePump::new(engine, stage);

    for p in device_packets(3) {
        pump.pump(Submission::Packet(&p)).unwrap();
    }
    pump.flush().unwrap();

    // Only the host copy is alive while the stage runs.
    assert_eq!(pump.stage().live_at_process, vec![1, 1, 1]);
    assert_eq!(live.get(), 0);
}

#[test]
fn flush_drains_frames_the_decoder_held_back() {
    let engine = ScriptedEngine {
        hold_back: 2,
        ..Default::default()
    };
    let live = engine.live.clone();
    let mut pump = FramePump::new(engine, RecordingStage::default());

    for p in device_packets(3) {
        pump.pump(Submission::Packet(&p)).unwrap();
    }
    assert_eq!(pump.stage().seen.len(), 1);

    pump.flush().unwrap();
    assert_eq!(pump.stage().seen.len(), 3);
    assert!(pump.engine().flushed);
    assert_eq!(pump.stats().packets_submitted, 3);
    assert_eq!(pump.state(), PumpState::Idle);
    assert_eq!(live.get(), 0);
}

#[test]
fn frames_reach_the_stage_in_decode_order() {
    let engine = ScriptedEngine {
        hold_back: 1,
        ..Default::default()
    };
    let mut pipeline = Pipeline::new(engine, RecordingStage::default());

    let packets = vec![
        packet(&[(0, ACCELERATOR), (1, ACCELERATOR)]),
        packet(&[]),
        packet(&[(2, ACCELERATOR)]),
        packet(&[(3, ACCELERATOR), (4, ACCELERATOR), (5, ACCELERATOR)]),
    ];
    let stats = pipeline.run(packets).unwrap();

    let ids: Vec<u32> = pipeline.pump().stage().seen.iter().map(|&(id, _)| id).collect();
    assert_eq!(ids, vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(stats.packets_submitted, 4);
    assert_eq!(stats.frames_presented, 6);
    assert!(!stats.cancelled);
}

#[test]
fn submit_failure_stops_with_decode_submit() {
    let engine = ScriptedEngine {
        fail_submit_on: Some(1),
        ..Default::default()
    };
    let live = engine.live.clone();
    let mut pipeline = Pipeline::new(engine, RecordingStage::default());

    let err = pipeline.run(device_packets(3)).unwrap_err();

    assert_eq!(err.kind, PlaybackErrorKind::DecodeSubmit);
    assert_eq!(err.exit_code(), 6);
    assert_eq!(pipeline.pump().stats().packets_submitted, 1);
    assert_eq!(pipeline.pump().stage().seen.len(), 1);
    assert!(!pipeline.pump().engine().flushed);
    assert_eq!(live.get(), 0);
}

#[test]
fn receive_failure_stops_with_decode_receive() {
    let engine = ScriptedEngine {
        fail_receive_after: Some(2),
        ..Default::default()
    };
    let mut pipeline = Pipeline::new(engine, RecordingStage::default());

    let err = pipeline.run(device_packets(4)).unwrap_err();

    assert_eq!(err.kind, PlaybackErrorKind::DecodeReceive);
    assert_eq!(pipeline.pump().stage().seen.len(), 2);
}

#[test]
fn transfer_failure_still_releases_the_device_frame() {
    let engine = ScriptedEngine {
        fail_transfer: true,
        ..Default::default()
    };
    let live = engine.live.clone();
    let mut pump = FramePump::new(engine, RecordingStage::default());

    let err = pump
        .pump(Submission::Packet(&packet(&[(0, ACCELERATOR)])))
        .unwrap_err();

    assert_eq!(err.kind, PlaybackErrorKind::FrameTransfer);
    assert_eq!(pump.engine().transfers, 1);
    assert!(pump.stage().seen.is_empty());
    assert_eq!(pump.stats().frames_transferred, 0);
    assert_eq!(pump.stats().frames_presented, 0);
    assert_eq!(pump.state(), PumpState::Idle);
    assert_eq!(live.get(), 0);
}

#[test]
fn stage_failure_releases_both_copies() {
    let engine = ScriptedEngine::default();
    let live = engine.live.clone();
    let stage = RecordingStage {
        fail_on: Some(0),
        ..Default::default()
    };
    let mut pump = FramePump::new(engine, stage);

    let err = pump
        .pump(Submission::Packet(&packet(&[(0, ACCELERATOR)])))
        .unwrap_err();

    assert_eq!(err.kind, PlaybackErrorKind::Conversion);
    assert_eq!(pump.stats().frames_transferred, 1);
    assert_eq!(pump.stats().frames_presented, 0);
    assert_eq!(live.get(), 0);
}

#[test]
fn stop_request_skips_the_flush() {
    let engine = ScriptedEngine::default();
    let stage = RecordingStage {
        stop_after: Some(2),
        ..Default::default()
    };
    let mut pipeline = Pipeline::new(engine, stage);

    let stats = pipeline.run(device_packets(5)).unwrap();

    assert!(stats.cancelled);
    assert_eq!(stats.packets_submitted, 2);
    assert_eq!(stats.frames_presented, 2);
    assert!(!pipeline.pump().engine().flushed);
}

#[test]
fn empty_source_only_flushes() {
    let mut pipeline = Pipeline::new(ScriptedEngine::default(), RecordingStage::default());

    let stats = pipeline.run(Vec::new()).unwrap();

    assert_eq!(stats, PumpStats::default());
    assert!(pipeline.pump().engine().flushed);
    assert_eq!(pipeline.pump().engine().submissions, 1);
}

#[test]
fn unknown_device_type_is_a_device_init_error() {
    let err = device_type_by_name("no-such-accelerator").unwrap_err();
    assert_eq!(err.kind, PlaybackErrorKind::DeviceInit);
    assert!(err.message.as_str().contains("no-such-accelerator"));

    for name in available_device_types() {
        assert!(device_type_by_name(&name).is_ok(), "{} should resolve", name);
    }
}

struct HostPacket {
    luma: u8,
    width: u32,
    height: u32,
}

/// Produces accelerator-tagged frames that carry no data and "transfers"
/// them into real NV12 host frames filled with the packet's luma value.
#[derive(Default)]
struct HostEngine {
    pending: VecDeque<frame::Video>,
    flushed: bool,
    transfers: usize,
}

impl DecodeEngine for HostEngine {
    type Packet = HostPacket;
    type Frame = frame::Video;

    fn accelerator_format(&self) -> Pixel {
        ACCELERATOR
    }

    fn submit(&mut self, submission: Submission<'_, HostPacket>) -> Result<(), PlaybackError> {
        match submission {
            Submission::Packet(packet) => {
                let mut device = frame::Video::empty();
                device.set_format(ACCELERATOR);
                device.set_width(packet.width);
                device.set_height(packet.height);
                device.set_pts(Some(i64::from(packet.luma)));
                self.pending.push_back(device);
            }
            Submission::Flush => self.flushed = true,
        }
        Ok(())
    }

    fn receive(&mut self) -> Result<Retrieval<frame::Video>, PlaybackError> {
        match self.pending.pop_front() {
            Some(frame) => Ok(Retrieval::Frame(frame)),
            None if self.flushed => Ok(Retrieval::EndOfStream),
            None => Ok(Retrieval::NeedsInput),
        }
    }

    fn transfer(&mut self, device: &frame::Video) -> Result<frame::Video, PlaybackError> {
        self.transfers += 1;
        let mut host = frame::Video::new(Pixel::NV12, device.width(), device.height());
        let luma = device.pts().unwrap_or(0) as u8;
        host.data_mut(0).fill(luma);
        host.data_mut(1).fill(128);
        host.set_pts(device.pts());
        Ok(host)
    }
}

struct RecordingSurface {
    width: u32,
    height: u32,
    lumas: Vec<u8>,
    shapes: Vec<Vec<(u32, u32)>>,
    redraws: usize,
    close_after: Option<usize>,
}

impl RecordingSurface {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            lumas: Vec::new(),
            shapes: Vec::new(),
            redraws: 0,
            close_after: None,
        }
    }
}

impl PresentationSurface for RecordingSurface {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn update_planes(&mut self, planes: &[PlaneRef<'_>]) -> Result<(), PlaybackError> {
        self.shapes
            .push(planes.iter().map(|p| (p.width, p.height)).collect());
        self.lumas.push(planes[0].data[0]);
        Ok(())
    }

    fn redraw(&mut self) -> Result<(), PlaybackError> {
        self.redraws += 1;
        Ok(())
    }

    fn poll_closed(&mut self) -> bool {
        self.close_after.is_some_and(|n| self.redraws >= n)
    }
}

fn presentation_pipeline(
    surface: RecordingSurface,
) -> Pipeline<HostEngine, PresentationStage<RecordingSurface>> {
    let presenter = Presenter::new(surface, Pacer::new(Duration::ZERO));
    Pipeline::new(HostEngine::default(), PresentationStage::new(presenter))
}

fn host_packets(lumas: &[u8], width: u32, height: u32) -> Vec<HostPacket> {
    lumas
        .iter()
        .map(|&luma| HostPacket {
            luma,
            width,
            height,
        })
        .collect()
}

#[test]
fn device_frames_are_presented_as_yuv420p_in_order() {
    let mut pipeline = presentation_pipeline(RecordingSurface::new(64, 64));

    let stats = pipeline.run(host_packets(&[40, 120, 200], 64, 64)).unwrap();

    assert_eq!(
        stats,
        PumpStats {
            packets_submitted: 3,
            frames_received: 3,
            frames_transferred: 3,
            frames_presented: 3,
            cancelled: false,
        }
    );

    let (engine, stage) = pipeline.into_parts();
    assert_eq!(engine.transfers, 3);
    assert!(engine.flushed);

    let presenter = stage.presenter();
    assert_eq!(presenter.presented(), 3);
    let surface = presenter.surface();
    assert_eq!(surface.redraws, 3);
    for shape in &surface.shapes {
        assert_eq!(shape, &vec![(64, 64), (32, 32), (32, 32)]);
    }
    for (got, want) in surface.lumas.iter().zip([40u8, 120, 200]) {
        assert!(got.abs_diff(want) <= 2, "luma {} != {}", got, want);
    }
}

#[test]
fn closing_the_surface_cancels_playback() {
    let mut surface = RecordingSurface::new(64, 64);
    surface.close_after = Some(1);
    let mut pipeline = presentation_pipeline(surface);

    let stats = pipeline.run(host_packets(&[10, 20, 30], 64, 64)).unwrap();

    assert!(stats.cancelled);
    assert_eq!(stats.frames_presented, 1);
    let (engine, _) = pipeline.into_parts();
    assert!(!engine.flushed);
}

#[test]
fn resolution_change_is_a_conversion_error() {
    let mut pipeline = presentation_pipeline(RecordingSurface::new(64, 64));

    let mut packets = host_packets(&[50], 64, 64);
    packets.extend(host_packets(&[60], 32, 32));
    let err = pipeline.run(packets).unwrap_err();

    assert_eq!(err.kind, PlaybackErrorKind::Conversion);
    assert_eq!(pipeline.pump().stats().frames_presented, 1);
}

#[test]
fn presenter_refuses_frames_of_the_wrong_size() {
    let mut presenter = Presenter::new(RecordingSurface::new(64, 64), Pacer::new(Duration::ZERO));

    let err = presenter
        .present(&ConvertedFrameBuffer::new(32, 32))
        .unwrap_err();

    assert_eq!(err.kind, PlaybackErrorKind::Presentation);
    assert_eq!(presenter.presented(), 0);
    assert!(presenter.surface().shapes.is_empty());
}

#[test]
fn converted_buffer_has_subsampled_chroma_planes() {
    let buffer = ConvertedFrameBuffer::new(65, 33);
    assert_eq!(buffer.format(), PRESENTATION_FORMAT);

    // Borrowed in place, one fixed array per frame.
    let planes: [PlaneRef<'_>; 3] = buffer.planes();
    assert_eq!(
        planes.map(|p| (p.width, p.height)),
        [(65, 33), (33, 17), (33, 17)]
    );
    assert!(planes[0].stride >= 65);
    assert!(planes[0].data.len() >= planes[0].stride * 33);
}

#[test]
fn converter_keeps_luma_of_same_size_input() {
    let mut source = frame::Video::new(Pixel::NV12, 32, 32);
    source.data_mut(0).fill(90);
    source.data_mut(1).fill(128);
    let mut target = ConvertedFrameBuffer::new(32, 32);

    ColorConverter::new().convert(&source, &mut target).unwrap();

    let planes = target.planes();
    assert!(planes[0].data[0].abs_diff(90) <= 2);
    assert!(planes[1].data[0].abs_diff(128) <= 2);
}

#[test]
#[ignore = "needs a CUDA capable device"]
fn cuda_device_context_can_be_created() {
    use super::hardware::HardwareContext;
    use ffmpeg_next::ffi::AVHWDeviceType;

    let context = HardwareContext::new(AVHWDeviceType::AV_HWDEVICE_TYPE_CUDA, ACCELERATOR).unwrap();
    assert_eq!(context.device_name(), "cuda");
    assert_eq!(context.pixel_format(), ACCELERATOR);
}
