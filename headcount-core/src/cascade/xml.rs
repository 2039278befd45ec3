//! Reader for OpenCV's `opencv-cascade-classifier` XML layout (BOOST + HAAR).

use std::str::FromStr;

use roxmltree::{Document, Node};

use super::model::{HaarFeature, Stage, TreeNode, WeakClassifier, WeightedRect};
use super::CascadeError;

/// Stage thresholds are relaxed by this amount when loaded.
const STAGE_THRESHOLD_EPS: f64 = 1e-5;

pub(crate) struct ParsedCascade {
    pub window: (u32, u32),
    pub stages: Vec<Stage>,
    pub features: Vec<HaarFeature>,
}

pub(crate) fn parse(xml: &str) -> Result<ParsedCascade, CascadeError> {
    let doc = Document::parse(xml)?;
    let storage = doc.root_element();

    let cascade = elements(storage)
        .find(|node| child(*node, "stages").is_some())
        .ok_or(CascadeError::MissingElement("stages"))?;

    if cascade.attribute("type_id") == Some("opencv-haar-classifier") {
        return Err(CascadeError::LegacyFormat);
    }

    let stage_type = text(required(cascade, "stageType")?);
    if stage_type != "BOOST" {
        return Err(CascadeError::Unsupported {
            kind: "stage type",
            value: stage_type.to_string(),
        });
    }
    let feature_type = text(required(cascade, "featureType")?);
    if feature_type != "HAAR" {
        return Err(CascadeError::Unsupported {
            kind: "feature type",
            value: feature_type.to_string(),
        });
    }

    let width: u32 = scalar(required(cascade, "width")?, "width")?;
    let height: u32 = scalar(required(cascade, "height")?, "height")?;
    if width < 3 || height < 3 {
        return Err(CascadeError::Invalid(format!(
            "detection window {width}x{height} is too small"
        )));
    }

    let features = elements(required(cascade, "features")?)
        .map(parse_feature)
        .collect::<Result<Vec<_>, _>>()?;

    let stages = elements(required(cascade, "stages")?)
        .map(parse_stage)
        .collect::<Result<Vec<_>, _>>()?;
    if stages.is_empty() {
        return Err(CascadeError::Invalid("cascade has no stages".into()));
    }

    let parsed = ParsedCascade {
        window: (width, height),
        stages,
        features,
    };
    validate(&parsed)?;
    Ok(parsed)
}

fn parse_stage(node: Node<'_, '_>) -> Result<Stage, CascadeError> {
    let threshold: f64 = scalar(required(node, "stageThreshold")?, "stageThreshold")?;
    let classifiers = elements(required(node, "weakClassifiers")?)
        .map(parse_weak_classifier)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Stage {
        threshold: threshold - STAGE_THRESHOLD_EPS,
        classifiers,
    })
}

fn parse_weak_classifier(node: Node<'_, '_>) -> Result<WeakClassifier, CascadeError> {
    let raw: Vec<f64> = numbers(required(node, "internalNodes")?, "internalNodes")?;
    if raw.is_empty() || raw.len() % 4 != 0 {
        return Err(CascadeError::Invalid(format!(
            "internalNodes holds {} values; expected groups of four",
            raw.len()
        )));
    }
    let nodes = raw
        .chunks_exact(4)
        .map(|chunk| {
            let feature = chunk[2];
            if feature < 0.0 || feature.fract() != 0.0 {
                return Err(CascadeError::InvalidNumber {
                    element: "internalNodes",
                    value: feature.to_string(),
                });
            }
            Ok(TreeNode {
                left: chunk[0] as i32,
                right: chunk[1] as i32,
                feature: feature as usize,
                threshold: chunk[3],
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let leaves = numbers(required(node, "leafValues")?, "leafValues")?;
    Ok(WeakClassifier { nodes, leaves })
}

fn parse_feature(node: Node<'_, '_>) -> Result<HaarFeature, CascadeError> {
    let rects = elements(required(node, "rects")?)
        .map(|rect| {
            let values: Vec<f64> = numbers(rect, "rects")?;
            if values.len() != 5 {
                return Err(CascadeError::Invalid(format!(
                    "feature rectangle has {} values; expected x y w h weight",
                    values.len()
                )));
            }
            Ok(WeightedRect {
                x: values[0] as i32,
                y: values[1] as i32,
                width: values[2] as i32,
                height: values[3] as i32,
                weight: values[4],
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    if rects.is_empty() {
        return Err(CascadeError::Invalid("feature without rectangles".into()));
    }
    let tilted = match child(node, "tilted") {
        Some(flag) => scalar::<i32>(flag, "tilted")? != 0,
        None => false,
    };
    Ok(HaarFeature { rects, tilted })
}

fn validate(parsed: &ParsedCascade) -> Result<(), CascadeError> {
    let (win_w, win_h) = (parsed.window.0 as i32, parsed.window.1 as i32);
    for (idx, feature) in parsed.features.iter().enumerate() {
        for r in &feature.rects {
            let inside = if feature.tilted {
                r.x - r.height >= 0
                    && r.x + r.width <= win_w
                    && r.y >= 0
                    && r.y + r.width + r.height <= win_h
            } else {
                r.x >= 0 && r.y >= 0 && r.x + r.width <= win_w && r.y + r.height <= win_h
            };
            if !inside || r.width <= 0 || r.height <= 0 {
                return Err(CascadeError::Invalid(format!(
                    "feature {idx} has a rectangle outside the {win_w}x{win_h} window"
                )));
            }
        }
    }

    let feature_count = parsed.features.len();
    for stage in &parsed.stages {
        for classifier in &stage.classifiers {
            let node_count = classifier.nodes.len() as i32;
            for (pos, node) in classifier.nodes.iter().enumerate() {
                if node.feature >= feature_count {
                    return Err(CascadeError::FeatureOutOfRange {
                        index: node.feature,
                        count: feature_count,
                    });
                }
                for child in [node.left, node.right] {
                    let ok = if child > 0 {
                        // Children must come later, which also rules out cycles.
                        child > pos as i32 && child < node_count
                    } else {
                        ((-child) as usize) < classifier.leaves.len()
                    };
                    if !ok {
                        return Err(CascadeError::Invalid(format!(
                            "tree node {pos} points at missing child {child}"
                        )));
                    }
                }
            }
        }
    }
    Ok(())
}

fn elements<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(Node::is_element)
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    elements(node).find(|n| n.tag_name().name() == name)
}

fn required<'a, 'input>(
    node: Node<'a, 'input>,
    name: &'static str,
) -> Result<Node<'a, 'input>, CascadeError> {
    child(node, name).ok_or(CascadeError::MissingElement(name))
}

fn text<'a>(node: Node<'a, '_>) -> &'a str {
    node.text().unwrap_or("").trim()
}

fn scalar<T: FromStr>(node: Node<'_, '_>, element: &'static str) -> Result<T, CascadeError> {
    let value = text(node);
    value.parse().map_err(|_| CascadeError::InvalidNumber {
        element,
        value: value.to_string(),
    })
}

fn numbers<T: FromStr>(node: Node<'_, '_>, element: &'static str) -> Result<Vec<T>, CascadeError> {
    text(node)
        .split_whitespace()
        .map(|token| {
            token.parse().map_err(|_| CascadeError::InvalidNumber {
                element,
                value: token.to_string(),
            })
        })
        .collect()
}
