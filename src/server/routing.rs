// The routing unit described by one `servers[]` entry: a publisher
// slot, a subscriber set, and the cached codec headers/metadata needed
// to bring a freshly-bound subscriber up to speed. Holds only
// connection ids — the supervisor's arena is always passed in
// explicitly, never shared behind a lock.

use std::collections::HashMap;

use crate::config::ServerDescription;
use crate::connection::Connection;
use crate::rtmp::RtmpData;

pub struct Server {
    pub description: ServerDescription,
    pub publisher: Option<u64>,
    pub subscribers: Vec<u64>,
    pub cached_audio_header: Option<Vec<u8>>,
    pub cached_video_header: Option<Vec<u8>>,
    pub cached_metadata: Option<RtmpData>,
    pub active_stream_name: Option<String>,
}

impl Server {
    pub fn new(description: ServerDescription) -> Server {
        Server {
            description,
            publisher: None,
            subscribers: Vec::new(),
            cached_audio_header: None,
            cached_video_header: None,
            cached_metadata: None,
            active_stream_name: None,
        }
    }

    /// Does an already-accepted connection at `address`, publishing
    /// `stream_name` under `application_name`, belong to this server's
    /// input list?
    pub fn accepts_input(&self, address: &str, application_name: &str, stream_name: &str) -> bool {
        self.description.inputs.iter().any(|d| d.matches(address, application_name, stream_name))
    }

    pub fn accepts_output(&self, address: &str, application_name: &str, stream_name: &str) -> bool {
        self.description.outputs.iter().any(|d| d.matches(address, application_name, stream_name))
    }

    /// Binds `connection_id` as the publisher, if this server doesn't
    /// already have one. Returns false (and leaves state unchanged) if
    /// a publisher is already bound — at most one publisher at a time.
    pub fn bind_publisher(&mut self, connection_id: u64, stream_name: &str) -> bool {
        if self.publisher.is_some() {
            return false;
        }
        self.publisher = Some(connection_id);
        self.active_stream_name = Some(stream_name.to_string());
        true
    }

    /// Releases the publisher slot if `connection_id` currently holds
    /// it, clearing the cached headers/metadata along with it.
    pub fn unbind_publisher(&mut self, connection_id: u64) {
        if self.publisher == Some(connection_id) {
            self.publisher = None;
            self.active_stream_name = None;
            self.cached_audio_header = None;
            self.cached_video_header = None;
            self.cached_metadata = None;
        }
    }

    /// Adds `connection_id` to the subscriber set and replays the
    /// cached video header, audio header and metadata into it (strictly
    /// before any live frame reaches it).
    pub fn add_subscriber(&mut self, connection_id: u64, arena: &mut HashMap<u64, Connection>) {
        if self.subscribers.contains(&connection_id) {
            return;
        }
        self.subscribers.push(connection_id);

        let video_header = self.cached_video_header.clone();
        let audio_header = self.cached_audio_header.clone();
        let metadata = self.cached_metadata.clone();

        if let Some(conn) = arena.get_mut(&connection_id) {
            if video_header.is_some() {
                conn.video_header = video_header;
                conn.send_video_header();
            }
            if audio_header.is_some() {
                conn.audio_header = audio_header;
                conn.send_audio_header();
            }
            if let Some(metadata) = metadata {
                conn.metadata = Some(metadata);
                conn.send_metadata();
            }
        }
    }

    pub fn remove_subscriber(&mut self, connection_id: u64) {
        self.subscribers.retain(|id| *id != connection_id);
    }

    pub fn update_audio_header(&mut self, header: Option<Vec<u8>>) {
        if header.is_some() {
            self.cached_audio_header = header;
        }
    }

    pub fn update_video_header(&mut self, header: Option<Vec<u8>>) {
        if header.is_some() {
            self.cached_video_header = header;
        }
    }

    pub fn update_metadata(&mut self, data: RtmpData) {
        self.cached_metadata = Some(data);
    }

    /// Forwards an audio frame from `publisher_id` to every subscriber,
    /// in the order they were added. No-op if `publisher_id` isn't the
    /// currently bound publisher (a stale/late frame from a connection
    /// that already lost the slot).
    pub fn broadcast_audio(&self, publisher_id: u64, timestamp: u32, payload: &[u8], arena: &mut HashMap<u64, Connection>) {
        if self.publisher != Some(publisher_id) {
            return;
        }
        for &sub_id in &self.subscribers {
            if let Some(conn) = arena.get_mut(&sub_id) {
                conn.send_audio(timestamp, payload);
            }
        }
    }

    pub fn broadcast_video(&self, publisher_id: u64, timestamp: u32, payload: &[u8], arena: &mut HashMap<u64, Connection>) {
        if self.publisher != Some(publisher_id) {
            return;
        }
        for &sub_id in &self.subscribers {
            if let Some(conn) = arena.get_mut(&sub_id) {
                conn.send_video(timestamp, payload);
            }
        }
    }

    pub fn broadcast_meta(&self, publisher_id: u64, timestamp: u32, data: &RtmpData, arena: &mut HashMap<u64, Connection>) {
        if self.publisher != Some(publisher_id) {
            return;
        }
        for &sub_id in &self.subscribers {
            if let Some(conn) = arena.get_mut(&sub_id) {
                conn.send_text_data(timestamp, data);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConnectionDescription, ConnectionKind};
    use crate::connection::Connection;
    use crate::log::Logger;

    fn description() -> ConnectionDescription {
        ConnectionDescription {
            kind: ConnectionKind::Host,
            addresses: vec!["0.0.0.0:1935".to_string()],
            connection_timeout: 0.0,
            reconnect_interval: 0.0,
            reconnect_count: 0,
            application_name: "live".to_string(),
            stream_name: String::new(),
            override_application_name: None,
            override_stream_name: None,
            video: true,
            audio: true,
            data: true,
        }
    }

    fn server() -> Server {
        Server::new(ServerDescription { inputs: vec![description()], outputs: vec![] })
    }

    #[test]
    fn only_one_publisher_can_be_bound_at_a_time() {
        let mut s = server();
        assert!(s.bind_publisher(1, "stream"));
        assert!(!s.bind_publisher(2, "other"));
        assert_eq!(s.publisher, Some(1));
    }

    #[test]
    fn unbind_clears_cached_state() {
        let mut s = server();
        s.bind_publisher(1, "stream");
        s.update_audio_header(Some(vec![1, 2, 3]));
        s.unbind_publisher(1);

        assert!(s.publisher.is_none());
        assert!(s.cached_audio_header.is_none());
    }

    #[test]
    fn new_subscriber_receives_cached_headers_before_anything_else() {
        let mut s = server();
        s.bind_publisher(1, "stream");
        s.update_video_header(Some(vec![9, 9]));
        s.update_audio_header(Some(vec![8, 8]));

        let mut arena = HashMap::new();
        arena.insert(2, Connection::accepted(2, "peer:1935".to_string(), Logger::new_disabled()));

        s.add_subscriber(2, &mut arena);

        assert_eq!(arena.get(&2).unwrap().video_header, Some(vec![9, 9]));
        assert_eq!(arena.get(&2).unwrap().audio_header, Some(vec![8, 8]));
        assert!(s.subscribers.contains(&2));
    }

    #[test]
    fn broadcast_is_ignored_from_a_non_publisher() {
        let mut s = server();
        s.bind_publisher(1, "stream");

        let mut arena = HashMap::new();
        arena.insert(2, Connection::accepted(2, "peer:1935".to_string(), Logger::new_disabled()));
        s.add_subscriber(2, &mut arena);

        // publisher_id 99 never bound the slot; broadcast should be a no-op
        s.broadcast_audio(99, 0, &[1, 2, 3], &mut arena);
    }
}
