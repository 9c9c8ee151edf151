// Copyright 2015-2021 Swim Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use futures::future::BoxFuture;
use ratchet_server::{
    apply_mask, Connection, ConnectionHandler, Error, FrameHeader, Payload, ServerConfig,
    WebSocketServer,
};
use std::net::{IpAddr, Ipv4Addr};

struct Echo;

impl ConnectionHandler for Echo {
    fn on_text<'a>(&'a self, conn: &'a mut Connection, data: &'a str) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let _ = conn.send_text(data).await;
        })
    }

    fn on_ping<'a>(
        &'a self,
        conn: &'a mut Connection,
        frame: FrameHeader,
        mut payload: Payload,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            if let Some(mask) = frame.mask {
                apply_mask(mask, &mut payload);
            }
            let _ = conn.send_pong(&payload.into_vec()).await;
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = ServerConfig {
        bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 9001,
        ..ServerConfig::default()
    };

    let mut server = WebSocketServer::new(config, Echo);
    server.start().await?;
    println!("echo server listening on {}", server.local_addr().unwrap());

    tokio::signal::ctrl_c().await.expect("signal handler");
    server.stop().await;
    Ok(())
}
