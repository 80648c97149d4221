//! libx264 backend through ffmpeg-next. Only built with the `ffmpeg` feature.

use anyhow::{Context, Result, anyhow};
use ffmpeg_next::{Dictionary, Rational, picture};

use crate::codecs::StreamHeaders;
use crate::codecs::video::{CodedUnit, PlanarImage, VideoBackend, VideoParams, headers_from_annexb};

pub struct X264Backend {
    params: VideoParams,
    encoder: ffmpeg_next::codec::encoder::Video,
    headers: StreamHeaders,
    frame_index: i64,
}

/// Registers FFmpeg components. Safe to call more than once.
pub fn init() -> Result<()> {
    ffmpeg_next::init().map_err(|e| anyhow!("ffmpeg_next init: {}", e))
}

fn x264_params(params: &VideoParams) -> String {
    // vbv values are kbit for x264
    format!(
        "keyint={}:min-keyint={}:vbv-maxrate={}:vbv-bufsize={}:repeat-headers=1",
        params.keyint_max(),
        params.keyint_min(),
        params.vbv_bitrate() / 1000,
        params.vbv_bitrate() / 1000,
    )
}

fn open_encoder(params: &VideoParams) -> Result<ffmpeg_next::codec::encoder::Video> {
    let codec = ffmpeg_next::encoder::find_by_name("libx264")
        .ok_or_else(|| anyhow!("encoder libx264 not found"))?;
    let ctx = ffmpeg_next::codec::Context::new_with_codec(codec);
    let mut encoder = ctx.encoder().video()?;
    encoder.set_width(params.width);
    encoder.set_height(params.height);
    encoder.set_format(ffmpeg_next::format::Pixel::YUV420P);
    encoder.set_frame_rate(Some(Rational::new(params.frame_rate as i32, 1)));
    encoder.set_time_base(Rational::new(1, params.frame_rate as i32));
    encoder.set_bit_rate(params.bitrate as usize);
    encoder.set_max_bit_rate(params.vbv_bitrate() as usize);
    encoder.set_gop(params.keyint_max());
    encoder.set_max_b_frames(0);
    // parameter sets go into extradata as well
    encoder.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);

    let mut opts = Dictionary::new();
    opts.set("preset", &params.preset);
    opts.set("tune", &params.tune);
    opts.set("profile", &params.profile);
    opts.set("forced-idr", "1");
    opts.set("x264-params", &x264_params(params));

    encoder
        .open_with(opts)
        .with_context(|| format!("failed to open libx264 {}x{}", params.width, params.height))
}

fn read_extradata(encoder: &ffmpeg_next::codec::encoder::Video) -> Vec<u8> {
    unsafe {
        let ctx = encoder.0.as_ptr();
        let data = (*ctx).extradata;
        let size = (*ctx).extradata_size;
        if data.is_null() || size <= 0 {
            return Vec::new();
        }
        std::slice::from_raw_parts(data, size as usize).to_vec()
    }
}

impl X264Backend {
    pub fn open(params: &VideoParams) -> Result<Self> {
        init()?;
        let encoder = open_encoder(params)?;
        let headers = headers_from_annexb(&read_extradata(&encoder));
        log::info!(
            "libx264 opened {}x{}@{} {} {} {}",
            params.width,
            params.height,
            params.frame_rate,
            params.preset,
            params.tune,
            params.profile
        );
        Ok(Self {
            params: params.clone(),
            encoder,
            headers,
            frame_index: 0,
        })
    }

    fn drain(&mut self) -> Result<Vec<CodedUnit>> {
        let mut units = Vec::new();
        loop {
            let mut packet = ffmpeg_next::Packet::empty();
            match self.encoder.receive_packet(&mut packet) {
                Ok(()) => {
                    if let Some(data) = packet.data() {
                        units.push(CodedUnit::new(data.to_vec(), packet.is_key()));
                    }
                }
                Err(ffmpeg_next::Error::Other { errno }) if errno == ffmpeg_next::util::error::EAGAIN => {
                    break;
                }
                Err(ffmpeg_next::Error::Eof) => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(units)
    }
}

impl VideoBackend for X264Backend {
    fn encode(&mut self, picture: &PlanarImage<'_>, force_keyframe: bool) -> Result<Vec<CodedUnit>> {
        let mut frame = ffmpeg_next::frame::Video::new(
            ffmpeg_next::format::Pixel::YUV420P,
            picture.width as u32,
            picture.height as u32,
        );
        for plane in 0..3 {
            let src = picture.plane(plane);
            let src_stride = picture.stride(plane);
            let dst_stride = frame.stride(plane);
            let rows = if plane == 0 { picture.height } else { picture.height / 2 };
            let dst = frame.data_mut(plane);
            for row in 0..rows {
                dst[row * dst_stride..row * dst_stride + src_stride]
                    .copy_from_slice(&src[row * src_stride..(row + 1) * src_stride]);
            }
        }
        if force_keyframe {
            frame.set_kind(picture::Type::I);
        }
        frame.set_pts(Some(self.frame_index));
        self.frame_index += 1;

        self.encoder.send_frame(&frame)?;
        self.drain()
    }

    fn stream_headers(&mut self) -> Result<StreamHeaders> {
        Ok(self.headers.clone())
    }

    /// libx264 has no live bitrate knob through this API, the encoder is
    /// reopened with the new rate.
    fn reconfigure(&mut self, bitrate: u32) -> Result<()> {
        let mut params = self.params.clone();
        params.bitrate = bitrate;
        self.encoder = open_encoder(&params)?;
        self.params = params;
        // the next picture starts a new GOP, pts continue
        Ok(())
    }
}
