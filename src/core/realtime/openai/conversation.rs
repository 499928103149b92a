//! Conversation state rebuilt from server events.
//!
//! The Realtime API streams items as a series of small events (item created,
//! content part added, audio and transcript deltas, item done). `Conversation`
//! folds those into [`ConversationItem`]s and reports each change as a
//! [`RealtimeEvent`].

use std::collections::HashMap;

use super::config::ms_to_samples;
use super::messages::{ConversationItem as WireItem, ServerEvent};
use crate::core::realtime::base::{
    ConversationItem, FormattedContent, ItemDelta, ItemRole, ItemStatus, RealtimeEvent,
};

#[derive(Debug)]
struct ItemEntry {
    item: ConversationItem,
    /// Content part types in content-index order
    content_types: Vec<String>,
}

#[derive(Debug, Default)]
struct QueuedSpeech {
    audio_start_ms: u64,
    audio: Option<Vec<i16>>,
}

/// Accumulated items of one session.
#[derive(Debug, Default)]
pub struct Conversation {
    items: HashMap<String, ItemEntry>,
    queued_speech: HashMap<String, QueuedSpeech>,
    queued_transcripts: HashMap<String, String>,
    input_audio: Vec<i16>,
    queued_input_audio: Option<Vec<i16>>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget every item and buffered input.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Record microphone audio sent to the server, so user items can carry
    /// the audio that produced them.
    pub fn append_input_audio(&mut self, samples: &[i16]) {
        self.input_audio.extend_from_slice(samples);
    }

    /// Whether audio was appended since the last commit.
    pub fn has_pending_input(&self) -> bool {
        !self.input_audio.is_empty()
    }

    /// Hand the buffered input to the next user item after a manual commit.
    pub fn queue_input_audio(&mut self) {
        self.queued_input_audio = Some(std::mem::take(&mut self.input_audio));
    }

    pub fn get(&self, item_id: &str) -> Option<&ConversationItem> {
        self.items.get(item_id).map(|entry| &entry.item)
    }

    /// Content index of the item's audio part.
    pub fn audio_content_index(&self, item_id: &str) -> Option<usize> {
        self.items
            .get(item_id)?
            .content_types
            .iter()
            .position(|t| t == "audio")
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Apply one server event. Returns the conversation event it produces,
    /// if any.
    pub fn process(&mut self, event: ServerEvent) -> Option<RealtimeEvent> {
        match event {
            ServerEvent::ConversationItemCreated { item, .. }
            | ServerEvent::OutputItemAdded { item, .. } => self.upsert(item),

            ServerEvent::ContentPartAdded { item_id, part, .. } => {
                let entry = self.entry_mut(&item_id, "response.content_part.added")?;
                entry.content_types.push(part.content_type);
                None
            }

            ServerEvent::TranscriptionCompleted {
                item_id,
                transcript,
                ..
            } => {
                // An empty transcript still marks the item as transcribed
                let transcript = if transcript.is_empty() {
                    " ".to_string()
                } else {
                    transcript
                };
                match self.items.get_mut(&item_id) {
                    Some(entry) => {
                        entry.item.formatted.transcript = transcript.clone();
                        Some(updated(
                            &entry.item,
                            ItemDelta {
                                transcript: Some(transcript),
                                ..Default::default()
                            },
                        ))
                    }
                    None => {
                        self.queued_transcripts.insert(item_id, transcript);
                        None
                    }
                }
            }

            ServerEvent::TranscriptionFailed { item_id, error, .. } => Some(RealtimeEvent::Error {
                message: format!("Transcription failed for {}: {}", item_id, error.message),
                fatal: false,
            }),

            ServerEvent::SpeechStarted {
                item_id,
                audio_start_ms,
            } => {
                self.queued_speech.insert(
                    item_id,
                    QueuedSpeech {
                        audio_start_ms,
                        audio: None,
                    },
                );
                Some(RealtimeEvent::ConversationInterrupted)
            }

            ServerEvent::SpeechStopped {
                item_id,
                audio_end_ms,
            } => {
                let speech = self.queued_speech.entry(item_id).or_default();
                let start = ms_to_samples(speech.audio_start_ms).min(self.input_audio.len());
                let end = ms_to_samples(audio_end_ms).clamp(start, self.input_audio.len());
                speech.audio = Some(self.input_audio[start..end].to_vec());
                None
            }

            ServerEvent::ConversationItemTruncated {
                item_id,
                audio_end_ms,
                ..
            } => {
                let entry = self.entry_mut(&item_id, "conversation.item.truncated")?;
                let end = ms_to_samples(audio_end_ms);
                entry.item.formatted.audio.truncate(end);
                entry.item.formatted.transcript.clear();
                Some(RealtimeEvent::ConversationUpdated {
                    item: entry.item.clone(),
                    delta: None,
                })
            }

            ServerEvent::ConversationItemDeleted { item_id } => {
                self.items.remove(&item_id);
                None
            }

            ServerEvent::AudioTranscriptDelta { item_id, delta, .. } => {
                let entry = self.entry_mut(&item_id, "response.audio_transcript.delta")?;
                entry.item.formatted.transcript.push_str(&delta);
                Some(updated(
                    &entry.item,
                    ItemDelta {
                        transcript: Some(delta),
                        ..Default::default()
                    },
                ))
            }

            ServerEvent::TextDelta { item_id, delta, .. } => {
                let entry = self.entry_mut(&item_id, "response.text.delta")?;
                entry.item.formatted.text.push_str(&delta);
                Some(updated(
                    &entry.item,
                    ItemDelta {
                        text: Some(delta),
                        ..Default::default()
                    },
                ))
            }

            ServerEvent::AudioDelta { item_id, delta, .. } => {
                let samples = match ServerEvent::decode_audio_delta(&delta) {
                    Ok(samples) => samples,
                    Err(e) => {
                        return Some(RealtimeEvent::Error {
                            message: format!("Failed to decode audio delta: {}", e),
                            fatal: false,
                        });
                    }
                };
                let entry = self.entry_mut(&item_id, "response.audio.delta")?;
                entry.item.formatted.audio.extend_from_slice(&samples);
                Some(updated(
                    &entry.item,
                    ItemDelta {
                        audio: Some(samples),
                        ..Default::default()
                    },
                ))
            }

            ServerEvent::OutputItemDone { item, .. } => {
                let id = item.id?;
                let status = item
                    .status
                    .as_deref()
                    .map_or(ItemStatus::Completed, ItemStatus::parse);
                let entry = self.entry_mut(&id, "response.output_item.done")?;
                entry.item.status = status;
                Some(RealtimeEvent::ConversationUpdated {
                    item: entry.item.clone(),
                    delta: None,
                })
            }

            _ => None,
        }
    }

    fn entry_mut(&mut self, item_id: &str, event_type: &str) -> Option<&mut ItemEntry> {
        let entry = self.items.get_mut(item_id);
        if entry.is_none() {
            tracing::warn!("{}: item not found: {}", event_type, item_id);
        }
        entry
    }

    fn upsert(&mut self, wire: WireItem) -> Option<RealtimeEvent> {
        let Some(id) = wire.id.clone() else {
            tracing::warn!("Conversation item without id ignored");
            return None;
        };

        if let Some(entry) = self.items.get_mut(&id) {
            if let Some(status) = wire.status.as_deref() {
                entry.item.status = ItemStatus::parse(status);
            }
            return Some(RealtimeEvent::ConversationUpdated {
                item: entry.item.clone(),
                delta: None,
            });
        }

        let role = wire.role.as_deref().and_then(ItemRole::parse);
        let mut formatted = FormattedContent::default();
        let mut content_types = Vec::new();
        for part in wire.content.unwrap_or_default() {
            if let Some(text) = part.text {
                formatted.text.push_str(&text);
            }
            if let Some(transcript) = part.transcript {
                formatted.transcript.push_str(&transcript);
            }
            content_types.push(part.content_type);
        }

        if role == Some(ItemRole::User) {
            if let Some(speech) = self.queued_speech.remove(&id)
                && let Some(audio) = speech.audio
            {
                formatted.audio = audio;
            } else if let Some(audio) = self.queued_input_audio.take() {
                formatted.audio = audio;
            }
        }
        if let Some(transcript) = self.queued_transcripts.remove(&id) {
            formatted.transcript = transcript;
        }

        let item = ConversationItem {
            id: id.clone(),
            item_type: wire.item_type,
            role,
            status: wire
                .status
                .as_deref()
                .map_or(ItemStatus::InProgress, ItemStatus::parse),
            formatted,
        };
        tracing::debug!("Conversation item created: {} ({:?})", id, item.role);
        self.items.insert(
            id,
            ItemEntry {
                item: item.clone(),
                content_types,
            },
        );
        Some(RealtimeEvent::ConversationUpdated { item, delta: None })
    }
}

/// A delta update. The item's audio stays behind so each delta costs only its
/// own samples.
fn updated(item: &ConversationItem, delta: ItemDelta) -> RealtimeEvent {
    RealtimeEvent::ConversationUpdated {
        item: item.without_audio(),
        delta: Some(delta),
    }
}
