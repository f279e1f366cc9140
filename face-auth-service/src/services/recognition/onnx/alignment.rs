//! Similarity-transform alignment of a detected face onto the 112x112 ArcFace template.

use super::super::FaceImage;

pub const ALIGNED_SIZE: usize = 112;
const CHANNELS: usize = 3;

/// Template positions of the eyes, nose tip and mouth corners.
pub const TEMPLATE_LANDMARKS: [(f32, f32); 5] = [
    (38.2946, 51.6963),
    (73.5318, 51.5014),
    (56.0252, 71.7366),
    (41.5493, 92.3655),
    (70.7299, 92.2041),
];

/// Forward map `(x, y) -> (a*x - b*y + tx, b*x + a*y + ty)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Similarity {
    pub a: f32,
    pub b: f32,
    pub tx: f32,
    pub ty: f32,
}

impl Similarity {
    /// Closed-form least-squares fit mapping `src` points onto `dst`.
    pub fn fit(src: &[(f32, f32); 5], dst: &[(f32, f32); 5]) -> Option<Self> {
        let n = src.len() as f32;
        let (smx, smy) = centroid(src);
        let (dmx, dmy) = centroid(dst);

        let mut dot = 0.0f32;
        let mut cross = 0.0f32;
        let mut energy = 0.0f32;
        for (&(sx, sy), &(dx, dy)) in src.iter().zip(dst.iter()) {
            let (sx, sy) = (sx - smx, sy - smy);
            let (dx, dy) = (dx - dmx, dy - dmy);
            dot += sx * dx + sy * dy;
            cross += sx * dy - sy * dx;
            energy += sx * sx + sy * sy;
        }

        if energy / n < 1e-6 {
            return None;
        }

        let a = dot / energy;
        let b = cross / energy;
        Some(Self {
            a,
            b,
            tx: dmx - (a * smx - b * smy),
            ty: dmy - (b * smx + a * smy),
        })
    }

    pub fn apply(&self, (x, y): (f32, f32)) -> (f32, f32) {
        (
            self.a * x - self.b * y + self.tx,
            self.b * x + self.a * y + self.ty,
        )
    }

    pub fn inverse(&self) -> Option<Self> {
        let det = self.a * self.a + self.b * self.b;
        if det < 1e-12 {
            return None;
        }
        let a = self.a / det;
        let b = -self.b / det;
        Some(Self {
            a,
            b,
            tx: -(a * self.tx - b * self.ty),
            ty: -(b * self.tx + a * self.ty),
        })
    }
}

fn centroid(points: &[(f32, f32); 5]) -> (f32, f32) {
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(ax, ay), &(x, y)| (ax + x, ay + y));
    (sx / points.len() as f32, sy / points.len() as f32)
}

/// Warp the face described by `landmarks` into a 112x112 RGB crop,
/// channel-interleaved like [`FaceImage`].
///
/// Pixels that fall outside the source frame are black. Returns `None` when
/// the landmarks are degenerate or the frame buffer is short.
pub fn align_face(image: &FaceImage, landmarks: &[(f32, f32); 5]) -> Option<Vec<u8>> {
    let width = image.width as i64;
    let height = image.height as i64;
    if image.pixels.len() < (width * height) as usize * CHANNELS {
        return None;
    }

    let to_template = Similarity::fit(landmarks, &TEMPLATE_LANDMARKS)?;
    let to_source = to_template.inverse()?;

    let sample = |x: i64, y: i64, c: usize| -> f32 {
        if x >= 0 && y >= 0 && x < width && y < height {
            image.pixels[(y * width + x) as usize * CHANNELS + c] as f32
        } else {
            0.0
        }
    };

    let mut out = vec![0u8; ALIGNED_SIZE * ALIGNED_SIZE * CHANNELS];
    for oy in 0..ALIGNED_SIZE {
        for ox in 0..ALIGNED_SIZE {
            let (sx, sy) = to_source.apply((ox as f32, oy as f32));
            let (x0, y0) = (sx.floor(), sy.floor());
            let (fx, fy) = (sx - x0, sy - y0);
            let (x0, y0) = (x0 as i64, y0 as i64);

            for c in 0..CHANNELS {
                let top = sample(x0, y0, c) * (1.0 - fx) + sample(x0 + 1, y0, c) * fx;
                let bottom = sample(x0, y0 + 1, c) * (1.0 - fx) + sample(x0 + 1, y0 + 1, c) * fx;
                let value = top * (1.0 - fy) + bottom * fy;

                out[(oy * ALIGNED_SIZE + ox) * CHANNELS + c] = value.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    Some(out)
}
