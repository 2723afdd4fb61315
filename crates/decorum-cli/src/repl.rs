use std::io::{self, ErrorKind, Write};
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::Result;
use decorum_contracts::chat::{parse_intent, Intent, CHAT_HELP_COMMANDS};
use decorum_contracts::design::{Budget, DesignState, DesignStyle, ImageData, RoomType, PRESETS};
use decorum_contracts::runs::summary::{write_summary, SessionSummary};
use decorum_contracts::session::DesignSession;
use decorum_contracts::versions::{now_utc_iso, AspectRatio, Resolution, VideoState};
use decorum_engine::export::{export_version, export_video};
use decorum_engine::{GenerationError, Stream, Studio, StudioConfig};
use serde_json::{Map, Value};

use crate::transcribe_file;

pub(crate) fn run_session(studio: Arc<Studio>, config: &StudioConfig, out: &Path) -> Result<()> {
    let started_at = now_utc_iso();
    let stdin = io::stdin();
    let mut line = String::new();
    let mut video_job: Option<JoinHandle<()>> = None;

    println!("Decorum session started. Type /help for commands.");

    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let intent = parse_intent(line.trim_end_matches(['\n', '\r']));
        match intent.action.as_str() {
            "noop" => continue,
            "quit" => break,
            "help" => println!("Commands: {}", CHAT_HELP_COMMANDS.join(" ")),
            "generate_video" => {
                if let Some(prompt) = intent.prompt.clone() {
                    studio.with_session(|session| session.video.prompt = prompt);
                }
                if video_job.as_ref().is_some_and(|job| !job.is_finished()) {
                    println!("{}", GenerationError::Busy(Stream::Video).user_message());
                    continue;
                }
                let worker = Arc::clone(&studio);
                println!("Rendering video in the background. /cancel stops it.");
                video_job = Some(thread::spawn(move || match worker.generate_video() {
                    Ok(id) => println!("\nVideo {id} ready."),
                    Err(err) => println!("\n{}", err.user_message()),
                }));
            }
            "cancel_video" => {
                studio.cancel_video();
                println!("Cancelling video.");
            }
            "transcribe" => match intent.arg("path").filter(|path| !path.is_empty()) {
                Some(path) => match transcribe_file(config, Path::new(path), false) {
                    Ok(text) if !text.trim().is_empty() => {
                        studio.with_session(|session| {
                            let instructions = &mut session.design.instructions;
                            if !instructions.trim().is_empty() {
                                instructions.push(' ');
                            }
                            instructions.push_str(text.trim());
                        });
                        println!("Heard: {}", text.trim());
                    }
                    Ok(_) => println!("No speech recognized."),
                    Err(err) => println!("Transcription failed: {err:#}"),
                },
                None => println!("/transcribe requires a PCM file path"),
            },
            _ => {
                if let Err(err) = handle_intent(&studio, &intent, out) {
                    match err.downcast_ref::<GenerationError>() {
                        Some(generation) => println!("{}", generation.user_message()),
                        None => println!("Error: {err:#}"),
                    }
                }
            }
        }
    }

    if let Some(job) = video_job.take() {
        if !job.is_finished() {
            println!("Waiting for the video job to finish...");
        }
        let _ = job.join();
    }

    let session = studio.snapshot();
    let summary = SessionSummary {
        session_id: session.session_id.clone(),
        started_at,
        finished_at: now_utc_iso(),
        total_versions: session.graph.len() as u64,
        total_videos: session.videos.len() as u64,
        current_version_id: session.graph.current_id().map(str::to_string),
    };
    let mut extra = Map::new();
    extra.insert(
        "provider".to_string(),
        Value::String(studio.provider_name().to_string()),
    );
    write_summary(&out.join("summary.json"), &summary, Some(&extra))?;
    Ok(())
}

fn handle_intent(studio: &Studio, intent: &Intent, out: &Path) -> Result<()> {
    let id = intent.arg("id").unwrap_or("").trim();
    match intent.action.as_str() {
        "set_design" => {
            for (field, value) in &intent.settings_update {
                let value = value.as_str().unwrap_or("");
                let message = studio
                    .with_session(|session| apply_design_field(&mut session.design, field, value));
                println!("{}", message.unwrap_or_else(|err| err));
            }
        }
        "set_video" => {
            for (field, value) in &intent.settings_update {
                let value = value.as_str().unwrap_or("");
                let message = studio
                    .with_session(|session| apply_video_field(&mut session.video, field, value));
                println!("{}", message.unwrap_or_else(|err| err));
            }
        }
        "toggle_preset" => {
            if id.is_empty() {
                let ids: Vec<&str> = PRESETS.iter().map(|preset| preset.id).collect();
                println!("Presets: {}", ids.join(", "));
                return Ok(());
            }
            let on = studio.with_session(|session| session.design.toggle_preset(id));
            println!("Preset {id} {}", if on { "on" } else { "off" });
        }
        "set_inspiration" => {
            let path = intent.arg("path").unwrap_or("");
            let image = if path.is_empty() {
                None
            } else {
                Some(ImageData::from_path(Path::new(path))?)
            };
            let cleared = image.is_none();
            studio.with_session(|session| session.design.set_inspiration(image));
            println!("{}", if cleared { "Inspiration cleared." } else { "Inspiration set." });
        }
        "add_item" => {
            let path = intent.arg("path").unwrap_or("");
            if path.is_empty() {
                println!("/item requires a path");
                return Ok(());
            }
            let image = ImageData::from_path(Path::new(path))?;
            let instruction = intent.arg("instruction").unwrap_or("").to_string();
            let item_id =
                studio.with_session(|session| session.design.add_custom_item(image, instruction));
            println!("Added {item_id}");
        }
        "remove_item" => {
            let removed = studio.with_session(|session| session.design.remove_custom_item(id));
            println!("{}", if removed { format!("Removed {id}") } else { format!("No item {id}") });
        }
        "show_design" => {
            let session = studio.snapshot();
            print_design(&session.design, &session.video);
        }
        "generate" => {
            if let Some(prompt) = intent.prompt.clone() {
                studio.with_session(|session| session.design.instructions = prompt);
            }
            let version_id = studio.generate_image()?;
            print_version(studio, &version_id);
        }
        "regenerate" => {
            let version_id = studio.regenerate(id)?;
            print_version(studio, &version_id);
        }
        "history" => print_history(&studio.snapshot()),
        "select" => {
            studio.with_session(|session| session.restore(id))?;
            println!("Selected {id}; design form restored.");
        }
        "undo" => {
            let parent = studio.with_session(|session| {
                let parent = session.graph.undo()?;
                session.restore(&parent)?;
                Ok::<_, GenerationError>(parent)
            })?;
            println!("Back to {parent}");
        }
        "delete" => {
            let current = studio.with_session(|session| {
                session.graph.remove(id)?;
                Ok::<_, GenerationError>(session.graph.current_id().map(str::to_string))
            })?;
            println!(
                "Deleted {id}; current is {}",
                current.as_deref().unwrap_or("none")
            );
        }
        "diff" => {
            let diff = studio.with_session(|session| session.graph.diff(id))?;
            match diff {
                Some(diff) if diff.is_empty() => println!("{id} matches its parent's design."),
                Some(diff) => {
                    for (field, change) in &diff.design_changes {
                        if field == "instructions" {
                            continue;
                        }
                        println!("{field}: {} -> {}", change["from"], change["to"]);
                    }
                    for row in &diff.instructions_diff {
                        println!("{row}");
                    }
                }
                None => println!("{id} is an original upload."),
            }
        }
        "export" => {
            let target = if id.is_empty() {
                studio
                    .snapshot()
                    .graph
                    .current_id()
                    .map(str::to_string)
                    .unwrap_or_default()
            } else {
                id.to_string()
            };
            let exported = studio.with_session(|session| export_version(session, &target, out))?;
            println!("Exported {target} -> {}", exported.artifact_path.display());
        }
        "videos" => {
            let session = studio.snapshot();
            if session.videos.is_empty() {
                println!("No videos yet.");
            }
            for entry in session.videos.list() {
                println!(
                    "{}  {}  from {}  {} {} motion {}",
                    entry.id,
                    entry.timestamp,
                    entry.source_version_id.as_deref().unwrap_or("-"),
                    entry.config.resolution.as_str(),
                    entry.config.aspect_ratio.as_str(),
                    entry.config.motion_intensity
                );
            }
        }
        "remove_video" => {
            studio.with_session(|session| session.videos.remove(id))?;
            println!("Removed {id}");
        }
        "export_video" => {
            let target = if id.is_empty() {
                studio
                    .snapshot()
                    .videos
                    .latest()
                    .map(|entry| entry.id.clone())
                    .unwrap_or_default()
            } else {
                id.to_string()
            };
            let exported = studio.with_session(|session| export_video(session, &target, out))?;
            println!("Exported {target} -> {}", exported.artifact_path.display());
        }
        "new_project" => {
            let session_id = studio.new_project()?;
            println!("New project {session_id}");
            let path = intent.arg("path").unwrap_or("");
            if !path.is_empty() {
                let root = studio.upload_original(ImageData::from_path(Path::new(path))?)?;
                println!("Loaded {path} as {root}");
            }
        }
        "unknown" => {
            println!(
                "Unknown command: /{}",
                intent.arg("command").unwrap_or_default()
            );
        }
        other => println!("Unhandled action: {other}"),
    }
    Ok(())
}

/// Writes one text field of the design form. Returns the confirmation line
/// or a description of the rejected value.
pub(crate) fn apply_design_field(
    design: &mut DesignState,
    field: &str,
    value: &str,
) -> Result<String, String> {
    let value = value.trim();
    match field {
        "room_type" => {
            let room = RoomType::parse(value).ok_or_else(|| {
                unknown_choice("room type", value, RoomType::ALL.iter().map(|row| row.label()))
            })?;
            design.room_type = room;
            Ok(format!("Room set to {room}"))
        }
        "style" => {
            let style = DesignStyle::parse(value).ok_or_else(|| {
                unknown_choice("style", value, DesignStyle::ALL.iter().map(|row| row.label()))
            })?;
            design.style = style;
            Ok(format!("Style set to {style}"))
        }
        "budget" => {
            let budget = Budget::parse(value).ok_or_else(|| {
                unknown_choice("budget", value, Budget::ALL.iter().map(|row| row.key()))
            })?;
            design.budget = budget;
            Ok(format!("Budget set to {budget}"))
        }
        "mood" => {
            design.mood = value.to_string();
            Ok(format!("Mood set to '{value}'"))
        }
        "instructions" => {
            design.instructions = value.to_string();
            Ok("Instructions updated.".to_string())
        }
        "locked_elements" => {
            design.locked_elements = value.to_string();
            Ok(format!("Locked: '{value}'"))
        }
        other => Err(format!("Unknown design field '{other}'")),
    }
}

pub(crate) fn apply_video_field(
    video: &mut VideoState,
    field: &str,
    value: &str,
) -> Result<String, String> {
    let value = value.trim();
    match field {
        "motion_intensity" => {
            let mut next = video.clone();
            next.motion_intensity = value
                .parse::<u8>()
                .map_err(|_| format!("Motion intensity must be a number, got '{value}'"))?;
            next.validate()?;
            *video = next;
            Ok(format!("Motion intensity set to {}", video.motion_intensity))
        }
        "resolution" => {
            video.resolution = Resolution::parse(value)
                .ok_or_else(|| format!("Unknown resolution '{value}' (720p, 1080p)"))?;
            Ok(format!("Resolution set to {}", video.resolution.as_str()))
        }
        "aspect_ratio" => {
            video.aspect_ratio = AspectRatio::parse(value)
                .ok_or_else(|| format!("Unknown aspect ratio '{value}' (16:9, 9:16)"))?;
            Ok(format!("Aspect ratio set to {}", video.aspect_ratio.as_str()))
        }
        "style" => {
            if value.is_empty() {
                return Err("Video style cannot be empty".to_string());
            }
            video.style = value.to_string();
            Ok(format!("Video style set to {value}"))
        }
        "prompt" => {
            video.prompt = value.to_string();
            Ok("Video prompt updated.".to_string())
        }
        other => Err(format!("Unknown video field '{other}'")),
    }
}

fn unknown_choice<'a>(what: &str, value: &str, options: impl Iterator<Item = &'a str>) -> String {
    format!(
        "Unknown {what} '{value}' (choose from: {})",
        options.collect::<Vec<_>>().join(", ")
    )
}

fn print_version(studio: &Studio, id: &str) {
    let session = studio.snapshot();
    let Some(node) = session.graph.get(id) else {
        return;
    };
    println!("Created {id} from {}", node.parent_id.as_deref().unwrap_or("-"));
    if let Some(insights) = node.insights.as_ref() {
        println!("  {}", insights.vibe_summary);
        println!("  {}", insights.reasoning);
        for suggestion in &insights.suggestions {
            println!("  - {suggestion}");
        }
        println!("  Sustainability: {}/100", insights.sustainability_score);
    }
}

fn print_history(session: &DesignSession) {
    if session.graph.is_empty() {
        println!("No versions yet.");
        return;
    }
    let current = session.graph.current_id();
    for node in session.graph.nodes() {
        let marker = if Some(node.id.as_str()) == current { "*" } else { " " };
        println!(
            "{marker} {:<5} parent {:<5} {}  {}",
            node.id,
            node.parent_id.as_deref().unwrap_or("-"),
            node.timestamp,
            node.prompt_used
        );
    }
}

fn print_design(design: &DesignState, video: &VideoState) {
    println!("Room: {}", design.room_type);
    println!("Style: {}", design.style);
    println!("Budget: {}", design.budget);
    println!("Mood: {}", design.mood);
    println!("Instructions: {}", design.instructions);
    println!("Locked: {}", design.locked_elements);
    let presets: Vec<&str> = design.selected_presets.iter().map(String::as_str).collect();
    println!("Presets: {}", presets.join(", "));
    println!(
        "Inspiration: {}",
        if design.inspiration_image.is_some() { "set" } else { "none" }
    );
    for item in &design.custom_items {
        println!("Item {}: {}", item.id, item.placement());
    }
    println!(
        "Video: {} {} {} motion {}",
        video.style,
        video.resolution.as_str(),
        video.aspect_ratio.as_str(),
        video.motion_intensity
    );
}

#[cfg(test)]
mod tests {
    use decorum_contracts::design::{Budget, DesignState, DesignStyle, RoomType};
    use decorum_contracts::versions::{Resolution, VideoState};

    use super::{apply_design_field, apply_video_field};

    #[test]
    fn design_fields_parse_loosely_and_reject_unknown_values() {
        let mut design = DesignState::new();
        assert!(apply_design_field(&mut design, "room_type", "home office").is_ok());
        assert_eq!(design.room_type, RoomType::HomeOffice);
        assert!(apply_design_field(&mut design, "style", "Mid Century").is_ok());
        assert_eq!(design.style, DesignStyle::MidCentury);
        assert!(apply_design_field(&mut design, "budget", "luxury").is_ok());
        assert_eq!(design.budget, Budget::Luxury);

        let err = apply_design_field(&mut design, "style", "gothic").unwrap_err();
        assert!(err.contains("Japandi"));
        assert_eq!(design.style, DesignStyle::MidCentury);

        assert!(apply_design_field(&mut design, "locked_elements", " the bay window ").is_ok());
        assert_eq!(design.locked_elements, "the bay window");
    }

    #[test]
    fn video_fields_validate_before_writing() {
        let mut video = VideoState::default();
        assert!(apply_video_field(&mut video, "motion_intensity", "11").is_err());
        assert!(apply_video_field(&mut video, "motion_intensity", "fast").is_err());
        assert_eq!(video.motion_intensity, 5);
        assert!(apply_video_field(&mut video, "motion_intensity", "9").is_ok());
        assert_eq!(video.motion_intensity, 9);
        assert!(apply_video_field(&mut video, "resolution", "1080p").is_ok());
        assert_eq!(video.resolution, Resolution::FullHd);
        assert!(apply_video_field(&mut video, "aspect_ratio", "square").is_err());
    }
}
