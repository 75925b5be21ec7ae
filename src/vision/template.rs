//! Reference sprites and the catalog the locator searches with.

use super::{to_grey, Size};
use crate::error::{AgentError, Result};

use opencv::core::{self, Mat, Scalar, CV_8UC1, CV_8UC3};
use opencv::imgcodecs;
use opencv::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use std::fs;
use std::path::{Path, PathBuf};

// Templates with fewer background pixels than this are matched unmasked.
// A nearly-full mask still lets the template match almost anything.
pub const MIN_MASKED_PIXELS: u32 = 10;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Mario,
    Enemy,
    HardEnemy,
    Block,
    Item,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Mario,
        Category::Enemy,
        Category::HardEnemy,
        Category::Block,
        Category::Item,
    ];

    /// Objects of these categories can face either way.
    pub fn is_mirrored(self) -> bool {
        matches!(self, Category::Mario | Category::Enemy | Category::HardEnemy)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    SmallMario,
    TallMario,
    FireMario,
    Goomba,
    Koopa,
    Spiny,
    PiranhaPlant,
    Block,
    QuestionBlock,
    Pipe,
    Mushroom,
    FireFlower,
    Star,
}

impl ObjectKind {
    pub fn category(self) -> Category {
        use self::ObjectKind::*;

        match self {
            SmallMario | TallMario | FireMario => Category::Mario,
            Goomba | Koopa => Category::Enemy,
            Spiny | PiranhaPlant => Category::HardEnemy,
            Block | QuestionBlock | Pipe => Category::Block,
            Mushroom | FireFlower | Star => Category::Item,
        }
    }
}

/// Background colour removed from sprites, one per level theme.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Ground,
    Underground,
    Castle,
}

impl Theme {
    /// Chroma key as RGB.
    pub fn mask_colour(self) -> [u8; 3] {
        match self {
            Theme::Ground => [104, 136, 252],
            Theme::Underground | Theme::Castle => [0, 0, 0],
        }
    }
}

/// One appearance of an object: greyscale pixels plus an optional mask
/// selecting the pixels that belong to the sprite.
#[derive(Clone)]
pub struct Template {
    image: Mat,
    mask: Option<Mat>,
    size: Size,
}

impl Template {
    /// `image` is 8-bit greyscale. A mask must cover it exactly; non-zero
    /// mask pixels take part in matching.
    pub fn new(image: Mat, mask: Option<Mat>) -> Result<Template> {
        if let Some(mask) = &mask {
            if mask.cols() != image.cols() || mask.rows() != image.rows() {
                return Err(AgentError::MaskSize {
                    image: (image.cols(), image.rows()),
                    mask: (mask.cols(), mask.rows()),
                });
            }
        }
        let size = Size::of(&image);
        Ok(Template { image, mask, size })
    }

    /// Builds a template from a BGR sprite, masking out every pixel that is
    /// exactly `mask_colour` (given as RGB).
    pub fn from_bgr(sprite: &Mat, mask_colour: [u8; 3]) -> Result<Template> {
        let [r, g, b] = mask_colour;
        let key = Mat::new_rows_cols_with_default(
            sprite.rows(),
            sprite.cols(),
            CV_8UC3,
            Scalar::new(b as f64, g as f64, r as f64, 0.0),
        )?;
        let mut background = Mat::default();
        core::in_range(sprite, &key, &key, &mut background)?;

        let masked_out = core::count_non_zero(&background)? as u32;
        let mask = if masked_out < MIN_MASKED_PIXELS {
            None
        } else {
            let mut mask = Mat::default();
            core::bitwise_not_def(&background, &mut mask)?;
            Some(mask)
        };
        Template::new(to_grey(sprite)?, mask)
    }

    pub fn flipped(&self) -> Result<Template> {
        let flip = |mat: &Mat| -> Result<Mat> {
            let mut flipped = Mat::default();
            core::flip(mat, &mut flipped, 1)?;
            Ok(flipped)
        };
        Ok(Template {
            image: flip(&self.image)?,
            mask: self.mask.as_ref().map(flip).transpose()?,
            size: self.size,
        })
    }

    /// No contrast among the pixels that take part in matching.
    pub fn is_flat(&self) -> Result<bool> {
        let everything;
        let mask = match &self.mask {
            Some(mask) => mask,
            None => {
                everything = Mat::new_rows_cols_with_default(
                    self.image.rows(),
                    self.image.cols(),
                    CV_8UC1,
                    Scalar::all(255.0),
                )?;
                &everything
            }
        };
        let (mut min, mut max) = (0.0, 0.0);
        core::min_max_loc(&self.image, Some(&mut min), Some(&mut max), None, None, mask)?;
        Ok(min == max)
    }

    pub fn image(&self) -> &Mat {
        &self.image
    }

    pub fn mask(&self) -> Option<&Mat> {
        self.mask.as_ref()
    }

    pub fn size(&self) -> Size {
        self.size
    }
}

pub struct KindTemplates {
    pub kind: ObjectKind,
    pub templates: Vec<Template>,
}

pub struct PipeTemplates {
    pub upper: Template,
    pub lower: Template,
}

/// Every template the locator knows about, in search order.
///
/// Built once before the first frame and only read afterwards.
#[derive(Default)]
pub struct Catalog {
    kinds: Vec<KindTemplates>,
    pipe: Option<PipeTemplates>,
}

impl Catalog {
    pub fn new() -> Catalog {
        Catalog::default()
    }

    /// Builds a catalog from templates already in memory, in the given order.
    pub fn from_templates<I>(templates: I) -> Result<Catalog>
    where
        I: IntoIterator<Item = (ObjectKind, Template)>,
    {
        let mut catalog = Catalog::new();
        for (kind, template) in templates {
            catalog.add_template(kind, template)?;
        }
        Ok(catalog)
    }

    pub fn load(manifest: &TemplateManifest) -> Result<Catalog> {
        let mask_colour = manifest.theme.mask_colour();
        let load = |file: &PathBuf| -> Result<Template> {
            let path = manifest.root.join(file);
            let sprite = match path.to_str() {
                Some(name) => imgcodecs::imread(name, imgcodecs::IMREAD_COLOR)?,
                None => Mat::default(),
            };
            if sprite.empty() {
                return Err(AgentError::TemplateLoad { path });
            }
            let template = Template::from_bgr(&sprite, mask_colour)?;
            if template.is_flat()? {
                warn!("{} is a single shade and will never match", path.display());
            }
            debug!(
                "loaded {} ({}x{}, masked: {})",
                path.display(),
                template.size.width,
                template.size.height,
                template.mask.is_some()
            );
            Ok(template)
        };

        let mut catalog = Catalog::new();
        for entry in &manifest.kinds {
            if entry.kind == ObjectKind::Pipe {
                match entry.files.as_slice() {
                    [upper, lower] => catalog.set_pipe(load(upper)?, load(lower)?),
                    files => {
                        return Err(AgentError::Manifest(format!(
                            "pipe needs an upper and a lower section, got {} files",
                            files.len()
                        )))
                    }
                }
                continue;
            }
            for file in &entry.files {
                catalog.add_template(entry.kind, load(file)?)?;
            }
        }
        Ok(catalog)
    }

    /// Appends a template to its kind, followed by its mirror image when
    /// the kind can face both ways.
    pub fn add_template(&mut self, kind: ObjectKind, template: Template) -> Result<()> {
        if kind == ObjectKind::Pipe {
            warn!("pipe templates must be set as a pair, ignoring");
            return Ok(());
        }
        let index = match self.kinds.iter().position(|k| k.kind == kind) {
            Some(index) => index,
            None => {
                self.kinds.push(KindTemplates {
                    kind,
                    templates: Vec::new(),
                });
                self.kinds.len() - 1
            }
        };
        let templates = &mut self.kinds[index].templates;
        if kind.category().is_mirrored() {
            let flipped = template.flipped()?;
            templates.push(template);
            templates.push(flipped);
        } else {
            templates.push(template);
        }
        Ok(())
    }

    pub fn set_pipe(&mut self, upper: Template, lower: Template) {
        self.pipe = Some(PipeTemplates { upper, lower });
    }

    pub fn kinds(&self, category: Category) -> impl Iterator<Item = &KindTemplates> {
        self.kinds
            .iter()
            .filter(move |k| k.kind.category() == category)
    }

    pub fn templates(&self, kind: ObjectKind) -> &[Template] {
        self.kinds
            .iter()
            .find(|k| k.kind == kind)
            .map(|k| k.templates.as_slice())
            .unwrap_or(&[])
    }

    pub fn pipe(&self) -> Option<&PipeTemplates> {
        self.pipe.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindFiles {
    pub kind: ObjectKind,
    pub files: Vec<PathBuf>,
}

/// Which sprite files make up the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateManifest {
    pub root: PathBuf,
    #[serde(default)]
    pub theme: Theme,
    pub kinds: Vec<KindFiles>,
}

impl TemplateManifest {
    /// The standard sprite sheet for overworld levels.
    pub fn ground<P: Into<PathBuf>>(root: P) -> TemplateManifest {
        use self::ObjectKind::*;

        let entry = |kind, files: &[&str]| KindFiles {
            kind,
            files: files.iter().map(PathBuf::from).collect(),
        };
        TemplateManifest {
            root: root.into(),
            theme: Theme::Ground,
            kinds: vec![
                entry(
                    SmallMario,
                    &[
                        "marioA.png", "marioB.png", "marioC.png", "marioD.png", "marioE.png",
                        "marioF.png", "marioG.png",
                    ],
                ),
                entry(TallMario, &["tall_marioA.png", "tall_marioB.png", "tall_marioC.png"]),
                entry(FireMario, &["fire_marioA.png", "fire_marioB.png", "fire_marioC.png"]),
                entry(Goomba, &["goomba.png"]),
                entry(Koopa, &["koopaA.png", "koopaB.png"]),
                entry(Spiny, &["spinyA.png", "spinyB.png"]),
                entry(PiranhaPlant, &["piranha_plantA.png", "piranha_plantB.png"]),
                entry(Block, &["block1.png", "block2.png", "block3.png", "block4.png"]),
                entry(QuestionBlock, &["questionA.png", "questionB.png", "questionC.png"]),
                entry(Pipe, &["pipe_upper_section.png", "pipe_lower_section.png"]),
                entry(Mushroom, &["mushroom_red.png"]),
                entry(FireFlower, &["fire_flower.png"]),
                entry(Star, &["star.png"]),
            ],
        }
    }

    /// Reads a JSON manifest. A relative `root` is taken relative to the
    /// manifest's own directory.
    pub fn from_file(path: &Path) -> Result<TemplateManifest> {
        let text = fs::read_to_string(path)?;
        let mut manifest: TemplateManifest =
            serde_json::from_str(&text).map_err(|source| AgentError::Config {
                path: path.to_path_buf(),
                source,
            })?;
        if manifest.root.is_relative() {
            if let Some(dir) = path.parent() {
                manifest.root = dir.join(&manifest.root);
            }
        }
        Ok(manifest)
    }
}
