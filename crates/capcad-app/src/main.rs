//! CapCAD 演示程序入口
//!
//! 模拟一次硬件采集：采样线程通过通道送点，编辑线程缓冲后一次性提交，
//! 再用插件做批量编辑，最后保存并重新加载校验。

mod config;
mod sample;

use std::f64::consts::TAU;
use std::path::Path;
use std::thread;

use anyhow::{Context, Result};
use crossbeam::channel::Sender;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use capcad_command::prelude::*;
use capcad_core::ops;
use capcad_core::prelude::*;
use capcad_file::native;

use config::AppConfig;
use sample::InputUnit;

/// 批量编辑生成的外框所在图层
const OUTLINE_LAYER: &str = "outline";

/// 模拟采样数
const SAMPLE_COUNT: usize = 240;

fn main() -> Result<()> {
    let config = AppConfig::discover().context("Failed to load configuration")?;
    init_logging(&config)?;

    info!("Starting CapCAD...");

    let mut manager = CommandManager::with_config(Scene::new(), config.history.clone());
    manager
        .scene_mut()
        .create_layer(OUTLINE_LAYER, LayerOptions::named("Outline"))?;

    // 采集：采样线程只负责发送，会话在本线程消费
    let (sender, receiver) = capture_channel();
    let unit = config.machine.input_unit;
    let producer = thread::spawn(move || produce_samples(sender, unit));

    let mut session = CaptureSession::new(config.capture.clone());
    session.start();
    producer
        .join()
        .map_err(|_| anyhow::anyhow!("sample producer panicked"))?;
    let received = session.pump(&receiver);
    session.stop();
    info!("Captured {} samples", received);

    let created = manager.execute(session.commit())?;
    info!("Capture produced {} entities", created.len());

    // 批量编辑
    let plugins = build_plugins()?;
    info!("Registered plugins: {:?}", plugins.names());
    plugins
        .run("outline", &mut manager)
        .context("outline plugin failed")?;

    match plugins.run("trim-to-origin", &mut manager) {
        Ok(()) => info!("trim-to-origin applied"),
        Err(err) => warn!("trim-to-origin rolled back: {}", err),
    }

    report(&mut manager, &config);

    // 保存并重新加载
    let path = config.output.path.as_path();
    save_and_verify(manager.scene(), path, config.output.write_json)?;

    manager.undo()?;
    info!(
        "After undo: {} entities (undo {}, redo {})",
        manager.scene().len(),
        manager.undo_len(),
        manager.redo_len()
    );

    Ok(())
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .context("Invalid log level")?;
    tracing::subscriber::set_global_default(
        tracing_subscriber::fmt().with_env_filter(filter).finish(),
    )?;
    Ok(())
}

/// 模拟运动硬件：沿螺线输出文本采样
fn produce_samples(sender: Sender<MachinePoint>, unit: InputUnit) {
    let per_mm = 1_000.0 / unit.scale();
    for i in 0..SAMPLE_COUNT {
        let theta = i as f64 / SAMPLE_COUNT as f64 * 2.0 * TAU;
        let r = 5.0 + theta * 2.0;
        let text = format!(
            "X:{:.3},Y:{:.3}",
            r * theta.cos() * per_mm,
            r * theta.sin() * per_mm
        );
        let point = match sample::parse_sample(&text, unit, i as i64) {
            Ok(point) => point,
            Err(err) => {
                warn!("Dropped sample {}: {}", i, err);
                continue;
            }
        };
        if sender.send(point).is_err() {
            break;
        }
    }
}

fn build_plugins() -> Result<PluginRegistry> {
    let mut plugins = PluginRegistry::new();

    // 在全部实体外画一个外框
    plugins.register("outline", |api| {
        let bbox = api
            .list()
            .iter()
            .map(|e| e.bounding_box())
            .reduce(|a, b| a.union(&b))
            .ok_or_else(|| anyhow::anyhow!("nothing to outline"))?;

        let corners = [
            bbox.min,
            Point::new(bbox.max.x, bbox.min.y),
            bbox.max,
            Point::new(bbox.min.x, bbox.max.y),
        ];
        for k in 0..corners.len() {
            let edge = Line::new(corners[k], corners[(k + 1) % corners.len()])?;
            api.add(edge.into(), EntityOptions::on_layer(OUTLINE_LAYER))?;
        }
        Ok(())
    })?;

    // 把每条经过 y 轴的直线裁剪到 y 轴，任一失败则整体回滚
    plugins.register("trim-to-origin", |api| {
        let axis = Line::new(Point::new(0, -1_000_000), Point::new(0, 1_000_000))?;
        let targets: Vec<(EntityId, Line)> = api
            .list()
            .iter()
            .filter(|e| e.layer_id != OUTLINE_LAYER)
            .filter_map(|e| match &e.geometry {
                // 只处理真正跨过 y 轴的线段
                Geometry::Line(l) if l.start().x.signum() * l.end().x.signum() < 0 => {
                    Some((e.id, *l))
                }
                _ => None,
            })
            .collect();

        for (id, line) in targets {
            if ops::intersect_line_line(&line, &axis, EPS).is_some() {
                let trimmed = ops::trim_line_with_line(&line, &axis);
                if trimmed != line {
                    api.replace(id, trimmed.into())?;
                }
            }
        }
        Ok(())
    })?;

    Ok(plugins)
}

fn report(manager: &mut CommandManager, config: &AppConfig) {
    let scene = manager.scene();
    info!(
        "Scene version {}: {} entities on {} layers",
        scene.version(),
        scene.len(),
        scene.layers().len()
    );

    let cursor = Point::new(5_000, 0);
    let entities = scene.get_all();
    let mut snap = SnapEngine::new(config.snap.clone());
    if let Some(hit) = snap.find_snap_point(cursor, &entities) {
        info!(
            "Snap near {:?}: {} at {:?} ({:.0} um)",
            cursor,
            hit.snap_type.name(),
            hit.point,
            hit.distance
        );
    }

    let picked = manager
        .scene_mut()
        .select_at(&cursor, config.selection.tolerance);
    info!("Selected {:?}", picked);
}

fn save_and_verify(scene: &Scene, path: &Path, write_json: bool) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    native::save(scene, path).with_context(|| format!("Failed to save {}", path.display()))?;
    let loaded = native::load(path).with_context(|| format!("Failed to load {}", path.display()))?;
    anyhow::ensure!(
        loaded.len() == scene.len() && loaded.version() == scene.version(),
        "Reloaded scene differs from the saved one"
    );

    if write_json {
        let json_path = path.with_extension("json");
        native::save_json(scene, &json_path)
            .with_context(|| format!("Failed to save {}", json_path.display()))?;
    }
    Ok(())
}
