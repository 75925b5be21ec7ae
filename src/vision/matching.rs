//! Normalized cross-correlation template matching.
//!
//! Scores are OpenCV's `TM_CCOEFF_NORMED`: the mean-subtracted correlation
//! coefficient between the template and each window of the frame, in
//! `[-1, 1]`. With a mask only the pixels where the mask is non-zero take
//! part, both for the means and for the variances. Flat windows score 0.

use super::Point;
use crate::error::Result;

use opencv::core::Mat;
use opencv::imgproc;
use opencv::prelude::*;

/// Correlation score for every placement of a template inside a frame.
pub struct CorrelationMap {
    scores: Mat,
}

impl CorrelationMap {
    fn empty() -> CorrelationMap {
        CorrelationMap {
            scores: Mat::default(),
        }
    }

    /// Every placement scoring at least `threshold`, row by row.
    pub fn positions_above(&self, threshold: f32) -> Result<Vec<Point>> {
        if self.scores.empty() {
            return Ok(Vec::new());
        }
        let width = self.scores.cols().max(1) as usize;
        let scores = self.scores.data_typed::<f32>()?;
        Ok(scores
            .iter()
            .enumerate()
            .filter(|(_, &score)| score >= threshold)
            .map(|(i, _)| Point::new((i % width) as i32, (i / width) as i32))
            .collect())
    }
}

/// Slides `template` over `frame`, both single-channel 8-bit.
pub fn match_template(frame: &Mat, template: &Mat, mask: Option<&Mat>) -> Result<CorrelationMap> {
    if template.empty()
        || template.cols() > frame.cols()
        || template.rows() > frame.rows()
    {
        return Ok(CorrelationMap::empty());
    }

    let mut scores = Mat::default();
    match mask {
        Some(mask) => imgproc::match_template(
            frame,
            template,
            &mut scores,
            imgproc::TM_CCOEFF_NORMED,
            mask,
        )?,
        None => {
            imgproc::match_template_def(frame, template, &mut scores, imgproc::TM_CCOEFF_NORMED)?
        }
    }
    Ok(CorrelationMap { scores })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[test]
    fn exact_placement_is_the_only_hit() {
        let sprite = pattern(8, 8, 3);
        let mut frame = flat(40, 30, 90);
        paste(&mut frame, &sprite, (12, 7));

        let map = match_template(&frame, &sprite, None).unwrap();
        assert_eq!(map.positions_above(0.999).unwrap(), vec![Point::new(12, 7)]);
        assert_eq!(map.positions_above(0.9).unwrap(), vec![Point::new(12, 7)]);
    }

    #[test]
    fn flat_windows_score_zero() {
        let sprite = pattern(4, 4, 1);
        let frame = flat(10, 10, 200);
        let map = match_template(&frame, &sprite, None).unwrap();
        assert!(map.positions_above(0.01).unwrap().is_empty());
    }

    #[test]
    fn mask_ignores_background_pixels() {
        let sprite = pattern(6, 6, 5);
        let mut mask = flat(6, 6, 255);
        for i in 0..6 {
            put_pixel(&mut mask, i, 0, 0);
            put_pixel(&mut mask, 0, i, 0);
        }

        // The masked-out border is drawn in a different colour on screen.
        let mut frame = flat(20, 20, 10);
        paste(&mut frame, &sprite, (5, 5));
        for i in 0..6 {
            put_pixel(&mut frame, 5 + i, 5, 255);
            put_pixel(&mut frame, 5, 5 + i, 255);
        }

        let masked = match_template(&frame, &sprite, Some(&mask)).unwrap();
        assert!(masked.positions_above(0.999).unwrap().contains(&Point::new(5, 5)));

        let unmasked = match_template(&frame, &sprite, None).unwrap();
        assert!(!unmasked.positions_above(0.9).unwrap().contains(&Point::new(5, 5)));
    }

    #[test]
    fn template_larger_than_frame_has_no_placements() {
        let map = match_template(&flat(4, 4, 0), &pattern(8, 8, 0), None).unwrap();
        assert!(map.positions_above(-1.0).unwrap().is_empty());
    }
}
