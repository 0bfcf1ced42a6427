// Copyright 2026 The relaymeter Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#[macro_export]
macro_rules! expect_event_1 {
    ($event:expr, $event_type:ident) => {
        match $event {
            None => panic!("No event emitted"),
            Some(e) => match (e) {
                SessionEvent::$event_type(d) => d,
                _ => panic!("Expected $event_type, got {:?}", e),
            },
        }
    };
}

macro_rules! expect_on_complete {
    ($event:expr) => {
        crate::expect_event_1!($event, OnComplete)
    };
}

macro_rules! expect_on_failed {
    ($event:expr) => {
        match $event {
            None => panic!("No event emitted"),
            Some(e) => match (e) {
                SessionEvent::OnFailed(kind, _) => kind,
                _ => panic!("Expected OnFailed, got {:?}", e),
            },
        }
    };
}

macro_rules! expect_on_packet_received {
    ($event:expr) => {
        match $event {
            None => panic!("No event emitted"),
            Some(e) => match (e) {
                SessionEvent::OnPacketReceived(id, received, total) => (id, received, total),
                _ => panic!("Expected OnPacketReceived, got {:?}", e),
            },
        }
    };
}

macro_rules! expect_no_event {
    ($event:expr) => {
        match $event {
            None => {}
            Some(e) => panic!("Expected no event, got {:?}", e),
        }
    };
}

pub(crate) use expect_no_event;
#[allow(unused_imports)]
pub(crate) use expect_on_complete;
pub(crate) use expect_on_failed;
pub(crate) use expect_on_packet_received;
