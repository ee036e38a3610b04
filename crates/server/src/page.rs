pub(crate) const INDEX_HTML: &str = r###"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <meta name="theme-color" content="#0f1d2b" />
  <title>World of Bits</title>
  <link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css" crossorigin="" />
  <script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js" crossorigin=""></script>
  <style>
    :root{
      --bg:#0f1d2b;
      --panel:#132638ee;
      --edge:#4f799f77;
      --ink:#e6f4ff;
      --muted:#8aa3be;
      --ok:#4df5bf;
      --warn:#ffd06b;
      --bad:#ff7198;
      --pad:10px;
    }
    *{box-sizing:border-box;margin:0;padding:0}
    html,body{width:100%;height:100%;overflow:hidden}
    body{font-family:Inter,system-ui,sans-serif;color:var(--ink);background:var(--bg)}
    #map{position:absolute;inset:0;z-index:1}
    .bar{
      position:absolute;left:var(--pad);right:var(--pad);top:var(--pad);z-index:1000;
      display:flex;gap:12px;align-items:center;justify-content:space-between;
      padding:8px 12px;border:1px solid var(--edge);border-radius:12px;background:var(--panel);
    }
    .bar h1{font-size:14px;letter-spacing:.6px}
    .bar .sub{font-size:11px;color:var(--muted)}
    .btn{
      border:1px solid #4f799f;background:#0b1b30;color:var(--ink);
      border-radius:10px;padding:6px 10px;font-weight:600;cursor:pointer;
    }
    .btn:hover{border-color:#8de7ff}
    .status{
      position:absolute;left:var(--pad);bottom:var(--pad);z-index:1000;min-width:220px;
      padding:10px;border:1px solid var(--edge);border-radius:12px;background:var(--panel);
      font-size:12px;display:flex;flex-direction:column;gap:4px;
    }
    .status .k{color:var(--muted)}
    .status .won{color:var(--ok);font-weight:700}
    .pad{
      position:absolute;right:var(--pad);bottom:var(--pad);z-index:1000;
      display:grid;grid-template-columns:repeat(3,44px);gap:6px;
    }
    .pad.hidden{display:none}
    .pad .btn{height:44px;padding:0}
    .toast{
      position:absolute;left:50%;top:64px;transform:translateX(-50%);z-index:1100;
      padding:8px 12px;border-radius:10px;border:1px solid var(--edge);background:var(--panel);
      font-size:13px;opacity:0;transition:opacity .2s;pointer-events:none;
    }
    .toast.show{opacity:1}
    .toast.warning{border-color:var(--warn)}
    .toast.error{border-color:var(--bad)}
    .token-label{background:transparent;border:none;box-shadow:none;color:#0b1b30;font-weight:700}
  </style>
</head>
<body>
  <div id="map"></div>

  <header class="bar">
    <div>
      <h1>WORLD OF BITS</h1>
      <div class="sub">Collect tokens, merge equal values, reach the target.</div>
    </div>
    <div style="display:flex;gap:8px">
      <button id="modeBtn" class="btn" type="button">use geolocation</button>
      <button id="resetBtn" class="btn" type="button">new game</button>
    </div>
  </header>

  <section class="status">
    <div><span class="k">Holding</span> <span id="heldText">nothing</span></div>
    <div><span class="k">Cell</span> <span id="cellText">-</span></div>
    <div><span class="k">Movement</span> <span id="modeText">-</span></div>
    <div><span class="k">Modified cells</span> <span id="modifiedText">0</span></div>
    <div id="wonText" class="won" hidden>Target reached!</div>
  </section>

  <nav id="pad" class="pad hidden">
    <span></span><button class="btn" data-dir="north" type="button">&#9650;</button><span></span>
    <button class="btn" data-dir="west" type="button">&#9664;</button><span></span><button class="btn" data-dir="east" type="button">&#9654;</button>
    <span></span><button class="btn" data-dir="south" type="button">&#9660;</button><span></span>
  </nav>

  <div id="toast" class="toast"></div>

  <script>
  (function(){
    const $ = (id) => document.getElementById(id);
    const ZOOM = 19;

    const map = L.map("map", {
      zoom: ZOOM, minZoom: ZOOM, maxZoom: ZOOM,
      zoomControl: false, scrollWheelZoom: false,
      center: [0, 0],
    });
    L.tileLayer("https://tile.openstreetmap.org/{z}/{x}/{y}.png", {
      maxZoom: ZOOM,
      attribution: "&copy; OpenStreetMap contributors",
    }).addTo(map);

    const player = L.marker([0, 0]).bindTooltip("You").addTo(map);
    const rects = new Map();
    let watchId = null;
    let watchGen = null;
    let mode = "buttons";

    // Requests are chained so the server sees events in the order they happened.
    let queue = Promise.resolve();
    function post(path, body){
      return call(path, { method: "POST", headers: { "content-type": "application/json" }, body: JSON.stringify(body || {}) });
    }
    function call(path, init){
      queue = queue.then(async () => {
        try{
          const r = await fetch(path, init);
          if (!r.ok) { toast({ level: "error", text: await r.text() }); return; }
          apply(await r.json());
        }catch(e){
          toast({ level: "error", text: String(e) });
        }
      });
      return queue;
    }

    function styleFor(s){
      const color = s.interactable ? "#6ff8ff" : "#7f8fa0";
      const fill = s.token == null ? 0.05 : (s.interactable ? 0.45 : 0.25);
      return { color, weight: 1, fillColor: s.token == null ? color : "#ffd06b", fillOpacity: fill };
    }

    function label(rect, s){
      rect.unbindTooltip();
      if (s.token != null){
        rect.bindTooltip(String(s.token), { permanent: true, direction: "center", className: "token-label" });
      }
    }

    function apply(u){
      for (const c of (u.commands || [])){
        switch (c.op){
          case "draw_cell": {
            const b = c.bounds;
            const rect = L.rectangle([[b.southWest.lat, b.southWest.lng], [b.northEast.lat, b.northEast.lng]], styleFor(c.style));
            rect.on("click", () => post("/api/click", { cell: c.cell }));
            label(rect, c.style);
            rect.addTo(map);
            rects.set(c.handle, rect);
            break;
          }
          case "update_cell": {
            const rect = rects.get(c.handle);
            if (rect){ rect.setStyle(styleFor(c.style)); label(rect, c.style); }
            break;
          }
          case "remove_cell": {
            const rect = rects.get(c.handle);
            if (rect){ rect.remove(); rects.delete(c.handle); }
            break;
          }
          case "move_player":
            player.setLatLng([c.latLng.lat, c.latLng.lng]);
            break;
          case "pan_to":
            map.panTo([c.latLng.lat, c.latLng.lng]);
            break;
        }
      }
      for (const d of (u.directives || [])){
        switch (d.op){
          case "stop_geolocation_watch": stopWatch(); break;
          case "start_geolocation_watch": startWatch(d.watch); break;
          case "show_movement_buttons": $("pad").classList.remove("hidden"); break;
          case "hide_movement_buttons": $("pad").classList.add("hidden"); break;
        }
      }
      if (u.status) renderStatus(u.status);
      if (u.message) toast(u.message);
    }

    function renderStatus(s){
      mode = s.movement;
      $("heldText").textContent = s.heldToken == null ? "nothing" : String(s.heldToken);
      $("cellText").textContent = `${s.cell} (${s.position.lat.toFixed(5)}, ${s.position.lng.toFixed(5)})`;
      $("modeText").textContent = s.movement;
      $("modifiedText").textContent = String(s.modifiedCells);
      $("wonText").hidden = !s.won;
      $("modeBtn").textContent = s.movement === "buttons" ? "use geolocation" : "use buttons";
    }

    let toastTimer = null;
    function toast(m){
      const el = $("toast");
      el.textContent = m.text;
      el.className = `toast show ${m.level || ""}`;
      clearTimeout(toastTimer);
      toastTimer = setTimeout(() => { el.className = "toast"; }, 3000);
    }

    function stopWatch(){
      if (watchId !== null){ navigator.geolocation.clearWatch(watchId); }
      watchId = null;
      watchGen = null;
    }

    function startWatch(gen){
      stopWatch();
      if (!("geolocation" in navigator)){
        post("/api/position/error", { code: "unavailable", watch: gen });
        return;
      }
      watchGen = gen;
      watchId = navigator.geolocation.watchPosition(
        (p) => {
          if (watchGen !== gen) return;
          post("/api/position", {
            latLng: { lat: p.coords.latitude, lng: p.coords.longitude },
            accuracy: p.coords.accuracy,
            watch: gen,
          });
        },
        (e) => {
          if (watchGen !== gen) return;
          const code = e.code === 1 ? "permission_denied" : (e.code === 3 ? "timeout" : "unavailable");
          post("/api/position/error", { code, watch: gen });
        },
        { enableHighAccuracy: true, maximumAge: 0, timeout: 10000 },
      );
    }

    function sendViewport(){
      const b = map.getBounds();
      const sw = b.getSouthWest(), ne = b.getNorthEast();
      post("/api/viewport", { southWest: { lat: sw.lat, lng: sw.lng }, northEast: { lat: ne.lat, lng: ne.lng } });
    }

    map.on("moveend", sendViewport);

    for (const btn of document.querySelectorAll("#pad [data-dir]")){
      btn.addEventListener("click", () => post("/api/step", { direction: btn.dataset.dir }));
    }
    const KEYS = { ArrowUp: "north", ArrowDown: "south", ArrowLeft: "west", ArrowRight: "east" };
    window.addEventListener("keydown", (e) => {
      const dir = KEYS[e.key];
      if (!dir || mode !== "buttons") return;
      e.preventDefault();
      post("/api/step", { direction: dir });
    });

    $("modeBtn").addEventListener("click", () => {
      post("/api/mode", { mode: mode === "buttons" ? "geolocation" : "buttons" });
    });
    $("resetBtn").addEventListener("click", () => {
      if (confirm("Start a new game? Your progress will be lost.")) post("/api/new-game");
    });

    const movement = new URLSearchParams(location.search).get("movement") || "";
    call(`/api/state?movement=${encodeURIComponent(movement)}`, { cache: "no-store" })
      .then(() => sendViewport());
  })();
  </script>
</body>
</html>
"###;
