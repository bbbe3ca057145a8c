// src/audio_buffer.rs

/// One block of planar output audio, borrowed from the host.
///
/// Channel `n` occupies `data[n * frames..(n + 1) * frames]`. Sources only
/// ever add into it; the engine clears it at block start.
#[derive(Debug)]
pub struct AudioBuffer<'a> {
    pub channels: usize,
    pub frames: usize,
    data: &'a mut [f32],
}

impl<'a> AudioBuffer<'a> {
    /// Wrap `data` as `channels` planar channels. Trailing samples that do
    /// not fill a whole frame are ignored.
    pub fn new(data: &'a mut [f32], channels: usize) -> Self {
        let channels = channels.max(1);
        let frames = data.len() / channels;
        let data = &mut data[..frames * channels];
        Self {
            channels,
            frames,
            data,
        }
    }

    #[inline]
    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }

    #[inline]
    pub fn channel(&self, ch: usize) -> &[f32] {
        let start = ch * self.frames;
        &self.data[start..start + self.frames]
    }

    /// Mutable view of every channel, in order.
    #[inline]
    pub fn channels_mut(&mut self) -> impl Iterator<Item = &mut [f32]> {
        self.data.chunks_exact_mut(self.frames.max(1))
    }

    /// Largest absolute sample across all channels.
    pub fn peak(&self) -> f32 {
        self.data.iter().fold(0.0, |max, s| max.max(s.abs()))
    }

    /// Copy the block into `out` as interleaved frames, the layout WAV
    /// writers and most device callbacks expect.
    pub fn interleave_into(&self, out: &mut Vec<f32>) {
        out.clear();
        for frame in 0..self.frames {
            out.extend((0..self.channels).map(|ch| self.data[ch * self.frames + frame]));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planar_layout() {
        let mut data = [0.0f32; 8];
        let mut buf = AudioBuffer::new(&mut data, 2);
        assert_eq!(buf.frames, 4);

        if let Some(right) = buf.channels_mut().nth(1) {
            right[0] = 1.0;
        }
        assert_eq!(buf.channel(1), &[1.0, 0.0, 0.0, 0.0]);
        assert_eq!(buf.peak(), 1.0);

        let mut interleaved = Vec::new();
        buf.interleave_into(&mut interleaved);
        assert_eq!(interleaved, vec![0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_partial_frame_is_dropped() {
        let mut data = [0.5f32; 5];
        let mut buf = AudioBuffer::new(&mut data, 2);
        assert_eq!(buf.frames, 2);

        buf.clear();
        assert_eq!(buf.channels_mut().count(), 2);
        assert_eq!(data, [0.0, 0.0, 0.0, 0.0, 0.5]);
    }
}
