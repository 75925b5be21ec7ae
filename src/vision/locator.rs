//! Finds every catalogued object on one greyscale frame.

use super::matching::match_template;
use super::template::{Catalog, Category, KindTemplates, ObjectKind};
use super::{Point, Size};
use crate::ai::game_state::MarioStatus;
use crate::error::Result;

use opencv::core::Mat;
use opencv::prelude::*;
use serde::Serialize;

use std::collections::{HashMap, HashSet};

pub const MATCH_THRESHOLD: f32 = 0.9;

// The pipe body is narrower than its rim by this much on the left.
const PIPE_BODY_OFFSET: i32 = 2;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct Detection {
    pub position: Point,
    pub size: Size,
    pub kind: ObjectKind,
}

/// Detections of one frame, grouped by category.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct ObjectLocations {
    pub mario: Vec<Detection>,
    pub enemy: Vec<Detection>,
    pub hard_enemy: Vec<Detection>,
    pub block: Vec<Detection>,
    pub item: Vec<Detection>,
}

impl ObjectLocations {
    pub fn get(&self, category: Category) -> &[Detection] {
        match category {
            Category::Mario => &self.mario,
            Category::Enemy => &self.enemy,
            Category::HardEnemy => &self.hard_enemy,
            Category::Block => &self.block,
            Category::Item => &self.item,
        }
    }

    fn get_mut(&mut self, category: Category) -> &mut Vec<Detection> {
        match category {
            Category::Mario => &mut self.mario,
            Category::Enemy => &mut self.enemy,
            Category::HardEnemy => &mut self.hard_enemy,
            Category::Block => &mut self.block,
            Category::Item => &mut self.item,
        }
    }

    pub fn len(&self) -> usize {
        Category::ALL.iter().map(|&c| self.get(c).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn mario_kind(status: MarioStatus) -> ObjectKind {
    match status {
        MarioStatus::Small => ObjectKind::SmallMario,
        MarioStatus::Tall => ObjectKind::TallMario,
        MarioStatus::Fireball => ObjectKind::FireMario,
    }
}

// Matches of one kind keyed by position. A second match at the same pixel
// replaces the first one's size but keeps its place in the order.
#[derive(Default)]
struct Scratch {
    order: Vec<Point>,
    sizes: HashMap<Point, Size>,
}

impl Scratch {
    fn insert(&mut self, position: Point, size: Size) {
        if self.sizes.insert(position, size).is_none() {
            self.order.push(position);
        }
    }

    fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn into_detections(self, kind: ObjectKind) -> Vec<Detection> {
        let Scratch { order, sizes } = self;
        order
            .into_iter()
            .map(|position| Detection {
                position,
                size: sizes[&position],
                kind,
            })
            .collect()
    }
}

fn locate_kind(
    frame: &Mat,
    kind: &KindTemplates,
    stop_early: bool,
    threshold: f32,
) -> Result<Vec<Detection>> {
    let mut scratch = Scratch::default();
    for template in &kind.templates {
        let scores = match_template(frame, template.image(), template.mask())?;
        for position in scores.positions_above(threshold)? {
            scratch.insert(position, template.size());
        }
        if stop_early && !scratch.is_empty() {
            break;
        }
    }
    Ok(scratch.into_detections(kind.kind))
}

/// Pipes are an upper rim followed by any number of body tiles. The pipe
/// ends at the first tile height with no body match directly below.
/// A body reaching the bottom of the frame makes the pipe end there.
pub fn locate_pipes(frame: &Mat, catalog: &Catalog, threshold: f32) -> Result<Vec<Detection>> {
    let pipe = match catalog.pipe() {
        Some(pipe) => pipe,
        None => return Ok(Vec::new()),
    };

    let uppers = match_template(frame, pipe.upper.image(), pipe.upper.mask())?
        .positions_above(threshold)?;
    if uppers.is_empty() {
        return Ok(Vec::new());
    }
    let lowers: HashSet<Point> = match_template(frame, pipe.lower.image(), pipe.lower.mask())?
        .positions_above(threshold)?
        .into_iter()
        .collect();

    let upper = pipe.upper.size();
    let step = pipe.lower.size().height.max(1) as usize;
    let bottom = frame.rows().max(0) as u32;
    Ok(uppers
        .into_iter()
        .map(|top| {
            let height = (upper.height..bottom)
                .step_by(step)
                .find(|&h| {
                    !lowers.contains(&Point::new(top.x + PIPE_BODY_OFFSET, top.y + h as i32))
                })
                // The body runs off the bottom of the screen.
                .unwrap_or_else(|| bottom.saturating_sub(top.y as u32).max(upper.height));
            Detection {
                position: top,
                size: Size::new(upper.width, height),
                kind: ObjectKind::Pipe,
            }
        })
        .collect())
}

pub fn locate_objects(
    frame: &Mat,
    catalog: &Catalog,
    status: MarioStatus,
    threshold: f32,
) -> Result<ObjectLocations> {
    let mut locations = ObjectLocations::default();
    let mario = mario_kind(status);

    for category in Category::ALL {
        for kind in catalog.kinds(category) {
            // Mario is only ever drawn in his current form.
            if category == Category::Mario && kind.kind != mario {
                continue;
            }
            let found = locate_kind(frame, kind, category == Category::Mario, threshold)?;
            locations.get_mut(category).extend(found);
        }
    }
    let pipes = locate_pipes(frame, catalog, threshold)?;
    locations.block.extend(pipes);

    Ok(locations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::template::Template;
    use crate::vision::test_support::*;

    fn template(image: Mat) -> Template {
        Template::new(image, None).unwrap()
    }

    #[test]
    fn one_clean_object_gives_one_detection() {
        let goomba = pattern(16, 16, 1);
        let mut catalog = Catalog::new();
        catalog.add_template(ObjectKind::Goomba, template(goomba.clone())).unwrap();

        let mut frame = noisy_frame(96, 64);
        paste(&mut frame, &goomba, (40, 20));

        let locations = locate_objects(&frame, &catalog, MarioStatus::Small, MATCH_THRESHOLD).unwrap();
        assert_eq!(
            locations.enemy,
            vec![Detection {
                position: Point::new(40, 20),
                size: Size::new(16, 16),
                kind: ObjectKind::Goomba,
            }]
        );
        assert!(locations.mario.is_empty());
        assert!(locations.block.is_empty());
        assert_eq!(locations.len(), 1);
    }

    #[test]
    fn mirrored_template_finds_left_facing_sprite() {
        let facing_right = pattern(12, 16, 2);
        let mut facing_left = Mat::default();
        opencv::core::flip(&facing_right, &mut facing_left, 1).unwrap();
        let mut frame = noisy_frame(64, 48);
        paste(&mut frame, &facing_left, (10, 12));

        let mut catalog = Catalog::new();
        catalog.add_template(ObjectKind::Koopa, template(facing_right.clone())).unwrap();
        let locations = locate_objects(&frame, &catalog, MarioStatus::Small, MATCH_THRESHOLD).unwrap();
        assert_eq!(locations.enemy.len(), 1);
        assert_eq!(locations.enemy[0].position, Point::new(10, 12));

        // Without the mirror the same sprite is invisible.
        let unmirrored = KindTemplates {
            kind: ObjectKind::Koopa,
            templates: vec![template(facing_right)],
        };
        assert!(locate_kind(&frame, &unmirrored, false, MATCH_THRESHOLD).unwrap().is_empty());
    }

    #[test]
    fn only_the_current_mario_form_is_searched() {
        let small = pattern(12, 16, 3);
        let tall = pattern(16, 32, 4);
        let mut frame = noisy_frame(80, 80);
        paste(&mut frame, &small, (8, 40));
        paste(&mut frame, &tall, (40, 20));

        let mut catalog = Catalog::new();
        catalog.add_template(ObjectKind::SmallMario, template(small)).unwrap();
        catalog.add_template(ObjectKind::TallMario, template(tall)).unwrap();

        let found = locate_objects(&frame, &catalog, MarioStatus::Small, MATCH_THRESHOLD).unwrap();
        assert_eq!(found.mario.len(), 1);
        assert_eq!(found.mario[0].kind, ObjectKind::SmallMario);

        let found = locate_objects(&frame, &catalog, MarioStatus::Tall, MATCH_THRESHOLD).unwrap();
        assert_eq!(found.mario.len(), 1);
        assert_eq!(found.mario[0].position, Point::new(40, 20));
    }

    #[test]
    fn mario_search_stops_at_first_matching_template() {
        let first = pattern(12, 16, 5);
        let second = pattern(12, 16, 6);
        let mut frame = noisy_frame(64, 64);
        paste(&mut frame, &first, (4, 4));
        paste(&mut frame, &second, (40, 40));

        let kind = KindTemplates {
            kind: ObjectKind::SmallMario,
            templates: vec![template(first), template(second)],
        };
        let found = locate_kind(&frame, &kind, true, MATCH_THRESHOLD).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].position, Point::new(4, 4));
        assert_eq!(locate_kind(&frame, &kind, false, MATCH_THRESHOLD).unwrap().len(), 2);
    }

    #[test]
    fn same_position_keeps_one_detection() {
        let mut scratch = Scratch::default();
        scratch.insert(Point::new(3, 4), Size::new(16, 16));
        scratch.insert(Point::new(9, 4), Size::new(16, 16));
        scratch.insert(Point::new(3, 4), Size::new(16, 32));
        let found = scratch.into_detections(ObjectKind::Block);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].position, Point::new(3, 4));
        assert_eq!(found[0].size, Size::new(16, 32));
    }

    fn pipe_catalog() -> (Catalog, Mat, Mat) {
        let upper = pattern(32, 16, 8);
        let lower = pattern(28, 16, 9);
        let mut catalog = Catalog::new();
        catalog.set_pipe(template(upper.clone()), template(lower.clone()));
        (catalog, upper, lower)
    }

    #[test]
    fn pipe_without_body_is_one_section_high() {
        let (catalog, upper, _) = pipe_catalog();
        let mut frame = noisy_frame(96, 120);
        paste(&mut frame, &upper, (20, 30));

        let pipes = locate_pipes(&frame, &catalog, MATCH_THRESHOLD).unwrap();
        assert_eq!(pipes.len(), 1);
        assert_eq!(pipes[0].position, Point::new(20, 30));
        assert_eq!(pipes[0].size, Size::new(32, 16));
    }

    #[test]
    fn pipe_height_counts_body_tiles() {
        let (catalog, upper, lower) = pipe_catalog();
        let mut frame = noisy_frame(96, 120);
        paste(&mut frame, &upper, (20, 30));
        paste(&mut frame, &lower, (22, 46));
        paste(&mut frame, &lower, (22, 62));

        let locations = locate_objects(&frame, &catalog, MarioStatus::Small, MATCH_THRESHOLD).unwrap();
        assert_eq!(locations.block.len(), 1);
        assert_eq!(locations.block[0].kind, ObjectKind::Pipe);
        assert_eq!(locations.block[0].size, Size::new(32, 48));
    }

    #[test]
    fn pipe_reaching_the_bottom_ends_at_the_frame_edge() {
        let (catalog, upper, lower) = pipe_catalog();
        let mut frame = noisy_frame(96, 94);
        paste(&mut frame, &upper, (20, 30));
        for y in [46, 62, 78] {
            paste(&mut frame, &lower, (22, y));
        }

        let pipes = locate_pipes(&frame, &catalog, MATCH_THRESHOLD).unwrap();
        assert_eq!(pipes.len(), 1);
        assert_eq!(pipes[0].size, Size::new(32, 94 - 30));
    }

    #[test]
    fn no_rim_means_no_pipes() {
        let (catalog, _, lower) = pipe_catalog();
        let mut frame = noisy_frame(96, 120);
        paste(&mut frame, &lower, (22, 46));
        assert!(locate_pipes(&frame, &catalog, MATCH_THRESHOLD).unwrap().is_empty());
    }

    #[test]
    fn empty_catalog_finds_nothing() {
        let frame = noisy_frame(32, 32);
        let locations =
            locate_objects(&frame, &Catalog::new(), MarioStatus::Tall, MATCH_THRESHOLD).unwrap();
        assert!(locations.is_empty());
    }
}
