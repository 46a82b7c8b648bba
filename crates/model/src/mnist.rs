//! MNIST sample source (IDX format)
//!
//! IDX files start with a big-endian magic number followed by one big-endian
//! u32 per dimension, then the raw `u8` payload in row-major order.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use byteorder::{BigEndian, ReadBytesExt};
use neuromif_fixed_point::{export_lines_with, ExportSummary, RoundingMode};
use rand::Rng;

use crate::error::{ModelError, Result};

/// Magic number of an IDX3 unsigned-byte image file
pub const IMAGE_MAGIC: u32 = 0x0000_0803;

/// Magic number of an IDX1 unsigned-byte label file
pub const LABEL_MAGIC: u32 = 0x0000_0801;

fn read_magic<R: Read>(reader: &mut R, expected: u32) -> Result<()> {
    let magic = reader.read_u32::<BigEndian>()?;
    if magic != expected {
        return Err(ModelError::InvalidIdx(format!(
            "bad magic number 0x{:08x} (expected 0x{:08x})",
            magic, expected
        )));
    }
    Ok(())
}

/// Read exactly `len` payload bytes. The buffer grows with the bytes actually
/// present, so a header claiming more than the file holds fails cleanly.
fn read_payload<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    reader.take(len as u64).read_to_end(&mut data)?;
    if data.len() != len {
        return Err(ModelError::InvalidIdx(format!(
            "payload has {} bytes, header declares {}",
            data.len(),
            len
        )));
    }
    Ok(data)
}

/// A set of greyscale images
#[derive(Debug, Clone)]
pub struct IdxImages {
    pub count: usize,
    pub rows: usize,
    pub cols: usize,
    data: Vec<u8>,
}

impl IdxImages {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        read_magic(&mut reader, IMAGE_MAGIC)?;
        let count = reader.read_u32::<BigEndian>()? as usize;
        let rows = reader.read_u32::<BigEndian>()? as usize;
        let cols = reader.read_u32::<BigEndian>()? as usize;

        let len = count
            .checked_mul(rows)
            .and_then(|n| n.checked_mul(cols))
            .ok_or_else(|| ModelError::InvalidIdx("image dimensions overflow".to_string()))?;
        let data = read_payload(&mut reader, len)?;

        Ok(Self { count, rows, cols, data })
    }

    pub fn pixels_per_image(&self) -> usize {
        self.rows * self.cols
    }

    /// Raw bytes of one image
    pub fn image(&self, index: usize) -> Result<&[u8]> {
        if index >= self.count {
            return Err(ModelError::SampleOutOfRange {
                index,
                count: self.count,
            });
        }
        let n = self.pixels_per_image();
        Ok(&self.data[index * n..(index + 1) * n])
    }

    /// One image flattened row-major and scaled to [0.0, 1.0]
    pub fn normalized(&self, index: usize) -> Result<Vec<f32>> {
        Ok(self
            .image(index)?
            .iter()
            .map(|&p| p as f32 / 255.0)
            .collect())
    }
}

/// Class labels for an image set
#[derive(Debug, Clone)]
pub struct IdxLabels {
    labels: Vec<u8>,
}

impl IdxLabels {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        read_magic(&mut reader, LABEL_MAGIC)?;
        let count = reader.read_u32::<BigEndian>()? as usize;
        let labels = read_payload(&mut reader, count)?;
        Ok(Self { labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<u8> {
        self.labels.get(index).copied()
    }
}

/// One test image ready for export
#[derive(Debug, Clone, PartialEq)]
pub struct MnistSample {
    pub index: usize,
    pub label: Option<u8>,
    pub pixels: Vec<f32>,
}

/// Images plus optional labels
#[derive(Debug, Clone)]
pub struct SampleSource {
    images: IdxImages,
    labels: Option<IdxLabels>,
}

impl SampleSource {
    pub fn new(images: IdxImages, labels: Option<IdxLabels>) -> Result<Self> {
        if let Some(labels) = &labels {
            if labels.len() != images.count {
                return Err(ModelError::InvalidIdx(format!(
                    "{} labels for {} images",
                    labels.len(),
                    images.count
                )));
            }
        }
        Ok(Self { images, labels })
    }

    pub fn open<P: AsRef<Path>>(images_path: P, labels_path: Option<&Path>) -> Result<Self> {
        let images = IdxImages::from_file(images_path)?;
        let labels = labels_path.map(IdxLabels::from_file).transpose()?;
        Self::new(images, labels)
    }

    pub fn len(&self) -> usize {
        self.images.count
    }

    pub fn is_empty(&self) -> bool {
        self.images.count == 0
    }

    pub fn sample(&self, index: usize) -> Result<MnistSample> {
        let pixels = self.images.normalized(index)?;
        let label = self.labels.as_ref().and_then(|l| l.get(index));
        Ok(MnistSample { index, label, pixels })
    }

    /// Pick an image uniformly at random
    pub fn random_sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<MnistSample> {
        if self.is_empty() {
            return Err(ModelError::SampleOutOfRange { index: 0, count: 0 });
        }
        let index = rng.gen_range(0..self.len());
        self.sample(index)
    }
}

/// Write a sample's pixels to a memory image, one word per pixel
pub fn export_sample<P: AsRef<Path>>(
    sample: &MnistSample,
    path: P,
    mode: RoundingMode,
) -> Result<ExportSummary> {
    let path = path.as_ref();
    let summary = export_lines_with(sample.pixels.iter().copied(), path, mode)?;

    match sample.label {
        Some(label) => tracing::info!(
            "Exported image index {} (label: {}) to {} as 16-bit Q4.4",
            sample.index,
            label,
            path.display()
        ),
        None => tracing::info!(
            "Exported image index {} to {} as 16-bit Q4.4",
            sample.index,
            path.display()
        ),
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn idx3(count: u32, rows: u32, cols: u32, payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_u32::<BigEndian>(IMAGE_MAGIC).unwrap();
        buf.write_u32::<BigEndian>(count).unwrap();
        buf.write_u32::<BigEndian>(rows).unwrap();
        buf.write_u32::<BigEndian>(cols).unwrap();
        buf.extend_from_slice(payload);
        buf
    }

    fn idx1(labels: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_u32::<BigEndian>(LABEL_MAGIC).unwrap();
        buf.write_u32::<BigEndian>(labels.len() as u32).unwrap();
        buf.extend_from_slice(labels);
        buf
    }

    #[test]
    fn test_parse_images() {
        let data = idx3(2, 2, 2, &[0, 255, 51, 102, 1, 2, 3, 4]);
        let images = IdxImages::from_reader(data.as_slice()).unwrap();
        assert_eq!(images.count, 2);
        assert_eq!(images.pixels_per_image(), 4);
        assert_eq!(images.image(1).unwrap(), &[1, 2, 3, 4]);
        assert_eq!(images.normalized(0).unwrap(), vec![0.0, 1.0, 0.2, 0.4]);
        assert!(matches!(
            images.image(2),
            Err(ModelError::SampleOutOfRange { index: 2, count: 2 })
        ));
    }

    #[test]
    fn test_bad_magic() {
        let data = idx1(&[1, 2]);
        assert!(matches!(
            IdxImages::from_reader(data.as_slice()),
            Err(ModelError::InvalidIdx(_))
        ));
    }

    #[test]
    fn test_truncated_payload() {
        let data = idx3(2, 2, 2, &[0, 1, 2]);
        assert!(matches!(
            IdxImages::from_reader(data.as_slice()),
            Err(ModelError::InvalidIdx(_))
        ));
    }

    #[test]
    fn test_oversized_header() {
        // 2^56 declared bytes, none present
        let data = idx3(1 << 20, 1 << 20, 1 << 16, &[]);
        assert!(matches!(
            IdxImages::from_reader(data.as_slice()),
            Err(ModelError::InvalidIdx(_))
        ));

        let mut labels = Vec::new();
        labels.write_u32::<BigEndian>(LABEL_MAGIC).unwrap();
        labels.write_u32::<BigEndian>(u32::MAX).unwrap();
        labels.extend_from_slice(&[1, 2, 3]);
        assert!(matches!(
            IdxLabels::from_reader(labels.as_slice()),
            Err(ModelError::InvalidIdx(_))
        ));
    }

    #[test]
    fn test_label_count_mismatch() {
        let images = IdxImages::from_reader(idx3(2, 1, 1, &[0, 0]).as_slice()).unwrap();
        let labels = IdxLabels::from_reader(idx1(&[7]).as_slice()).unwrap();
        assert!(SampleSource::new(images, Some(labels)).is_err());
    }

    #[test]
    fn test_sample_with_label() {
        let images = IdxImages::from_reader(idx3(3, 1, 2, &[0, 0, 255, 0, 0, 255]).as_slice())
            .unwrap();
        let labels = IdxLabels::from_reader(idx1(&[4, 7, 9]).as_slice()).unwrap();
        let source = SampleSource::new(images, Some(labels)).unwrap();

        let sample = source.sample(1).unwrap();
        assert_eq!(sample.label, Some(7));
        assert_eq!(sample.pixels, vec![1.0, 0.0]);

        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..20 {
            let s = source.random_sample(&mut rng).unwrap();
            assert!(s.index < 3);
            assert_eq!(s.pixels.len(), 2);
        }
    }

    #[test]
    fn test_random_sample_empty() {
        let images = IdxImages::from_reader(idx3(0, 28, 28, &[]).as_slice()).unwrap();
        let source = SampleSource::new(images, None).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(source.random_sample(&mut rng).is_err());
    }
}
