// Per-tick housekeeping: USER_CONTROL pings and the once-a-second
// audio/video byte-rate latch. Called by the supervisor for every
// connection on every tick, driven by the same wall-clock delta as
// everything else (see `relay::RelaySupervisor`).

use crate::rtmp::messages;

use super::entity::Connection;

const MEASUREMENT_INTERVAL_SECONDS: f32 = 1.0;

/// Advances `conn`'s ping and measurement accumulators by
/// `delta_seconds`. `ping_interval` of `0.0` (or negative) disables
/// pings entirely, matching the configuration's meaning of "unset".
pub fn tick_ping_and_measurement(conn: &mut Connection, delta_seconds: f32, ping_interval: f32) {
    if ping_interval > 0.0 {
        conn.ping_accum += delta_seconds;
        if conn.ping_accum >= ping_interval {
            conn.ping_accum -= ping_interval;
            conn.send_message(&messages::ping_request(0));
        }
    }

    conn.measure_accum += delta_seconds;
    if conn.measure_accum >= MEASUREMENT_INTERVAL_SECONDS {
        conn.measure_accum -= MEASUREMENT_INTERVAL_SECONDS;
        conn.latch_measurement();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::Logger;

    fn conn() -> Connection {
        Connection::accepted(1, "127.0.0.1:1935".to_string(), Logger::new_disabled())
    }

    #[test]
    fn measurement_latches_once_per_second_regardless_of_ping() {
        let mut c = conn();
        c.audio_byte_rate = 0;

        tick_ping_and_measurement(&mut c, 0.4, 0.0);
        tick_ping_and_measurement(&mut c, 0.4, 0.0);
        assert_eq!(c.measure_accum, 0.8_f32);

        tick_ping_and_measurement(&mut c, 0.3, 0.0);
        assert!(c.measure_accum < MEASUREMENT_INTERVAL_SECONDS);
    }

    #[test]
    fn ping_interval_zero_disables_pings() {
        let mut c = conn();
        tick_ping_and_measurement(&mut c, 100.0, 0.0);
        assert_eq!(c.ping_accum, 0.0);
    }

    #[test]
    fn ping_accum_resets_after_firing() {
        let mut c = conn();
        tick_ping_and_measurement(&mut c, 5.5, 5.0);
        assert!(c.ping_accum < 5.0);
        assert!(c.ping_accum >= 0.0);
    }
}
